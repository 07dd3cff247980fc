use sheet_consolidator::config::Settings;
use sheet_consolidator::error::ErrorKind;
use sheet_consolidator::spreadsheet::writer::TableSink;
use sheet_consolidator::spreadsheet::writer::XlsxWriter;
use sheet_consolidator::spreadsheet::CellValue;
use sheet_consolidator::spreadsheet::GridSource;
use sheet_consolidator::spreadsheet::WorkbookSource;
use sheet_consolidator::table::ColumnType;
use sheet_consolidator::table::StructureType;
use sheet_consolidator::table::Table;
use std::fs;
use std::path::Path;

/// Writes `rows` as a sheet, the first row becoming the sheet's first line.
fn write_sheet(path: &Path, rows: Vec<Vec<CellValue>>) {
    let mut rows = rows.into_iter();
    let first: Vec<String> = rows.next().unwrap().iter().map(ToString::to_string).collect();
    XlsxWriter::default()
        .write_table(&Table::new(first, rows.collect()), path)
        .unwrap();
}

macro_rules! rows {
    ($([$($cell:expr),* $(,)?]),* $(,)?) => {
        vec![$(vec![$(CellValue::from($cell)),*]),*]
    };
}

fn prepare(root: &Path) {
    write_sheet(
        &root.join("rutas/ruta1.xlsx"),
        rows![["Nombre", "Edad"], ["Ana", 30], ["Nombre", "Edad"], ["Luis", 25]],
    );
    write_sheet(
        &root.join("rutas/ruta2.xlsx"),
        rows![
            ["FECHA:", "2024-01-01"],
            ["Nombre", "Valor"],
            ["Ana", 10],
            ["FECHA:", "2024-01-02"],
            ["Nombre", "Valor"],
            ["Luis", 20],
        ],
    );
    fs::write(root.join("rutas/roto.xlsx"), b"not a workbook").unwrap();
    fs::write(root.join("rutas/notas.txt"), b"ignored").unwrap();
}

#[tokio::test]
async fn consolidate_directory_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    prepare(root.path());
    let settings = Settings::default();

    let summary = sheet_consolidator::consolidate_directory(root.path(), None, true, 2, &settings)
        .await
        .unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    let failed: Vec<_> = summary.failures().collect();
    assert!(failed[0].input.ends_with("roto.xlsx"));
    assert_eq!(failed[0].error.as_ref().unwrap().kind, ErrorKind::UnsupportedFormat);

    let output = root.path().join("rutas/consolidado/ruta1_consolidado.xlsx");
    let sheets = WorkbookSource.list_sheets(&output).unwrap();
    let grid = WorkbookSource.read_grid(&output, &sheets[0]).unwrap();
    assert_eq!(grid.row_count(), 3);
    assert_eq!(grid.row(0), &[CellValue::from("Nombre"), CellValue::from("Edad")]);
    assert_eq!(grid.row(1), &[CellValue::from("Ana"), CellValue::from(30)]);
    assert_eq!(grid.row(2), &[CellValue::from("Luis"), CellValue::from(25)]);

    let output = root.path().join("rutas/consolidado/ruta2_consolidado.xlsx");
    let grid = WorkbookSource.read_grid(&output, "Consolidado").unwrap();
    assert_eq!(grid.row(0)[2], CellValue::from("fecha"));
    assert_eq!(grid.row(2)[2].to_string(), "2024-01-02");
    assert!(matches!(grid.row(2)[2], CellValue::Date(_)));

    // outputs live under an excluded directory and are not picked up again
    let again = sheet_consolidator::consolidate_directory(root.path(), None, false, 1, &settings)
        .await
        .unwrap();
    assert_eq!(again.total, 3);
}

#[tokio::test]
async fn dry_run_leaves_directory_untouched() {
    let root = tempfile::tempdir().unwrap();
    prepare(root.path());

    let summary = sheet_consolidator::consolidate_directory_dry_run(root.path(), &Settings::default())
        .await
        .unwrap();
    assert!(summary.dry_run);
    assert_eq!(summary.succeeded, 2);
    assert!(!root.path().join("rutas/consolidado").exists());

    let structures: Vec<_> = summary.results.iter().map(|result| result.structure).collect();
    assert_eq!(
        structures,
        vec![None, Some(StructureType::Complex), Some(StructureType::ComplexFecha)]
    );
}

#[test]
fn single_file_commands() {
    let root = tempfile::tempdir().unwrap();
    prepare(root.path());
    let settings = Settings::default();
    let file = root.path().join("rutas/ruta2.xlsx");

    let detection = sheet_consolidator::detect_structure(&file, &settings).unwrap();
    assert_eq!(detection.structure, StructureType::ComplexFecha);
    assert_eq!(detection.blocks.len(), 2);

    let analysis = sheet_consolidator::analyze_file(&file, &settings).unwrap();
    let kinds: Vec<_> = analysis.columns.iter().map(|column| column.kind).collect();
    assert_eq!(kinds, vec![ColumnType::Text, ColumnType::Integer, ColumnType::Date]);

    let output_dir = root.path().join("salida");
    let result = sheet_consolidator::consolidate_file(&file, Some(&output_dir), &settings).unwrap();
    assert_eq!(result.output, Some(output_dir.join("ruta2_consolidado.xlsx")));
    assert!(output_dir.join("ruta2_consolidado.xlsx").is_file());

    let error = sheet_consolidator::consolidate_file(&root.path().join("rutas/roto.xlsx"), None, &settings).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedFormat);

    let workbook = sheet_consolidator::analyze_workbook(&file, &settings).unwrap();
    assert_eq!(workbook.sheets.len(), 1);
    assert_eq!(workbook.sheets[0].sheet, "Consolidado");
    let analysis = workbook.sheets[0].analysis.as_ref().unwrap();
    assert_eq!(analysis.structure, StructureType::ComplexFecha);
    assert_eq!(analysis.rows, 2);
}

#[tokio::test]
async fn same_named_files_keep_separate_outputs() {
    let root = tempfile::tempdir().unwrap();
    write_sheet(&root.path().join("norte/ruta.xlsx"), rows![["Nombre", "Edad"], ["Ana", 30]]);
    write_sheet(&root.path().join("sur/ruta.xlsx"), rows![["Nombre", "Edad"], ["Luis", 25]]);
    let output_dir = root.path().join("salida");

    let summary = sheet_consolidator::consolidate_directory(root.path(), Some(&output_dir), true, 2, &Settings::default())
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 2);

    let mut written: Vec<_> = fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["ruta_consolidado.xlsx", "ruta_consolidado_2.xlsx"]);

    let norte = WorkbookSource.read_grid(&output_dir.join("ruta_consolidado.xlsx"), "Consolidado").unwrap();
    assert_eq!(norte.row(1)[0], CellValue::from("Ana"));
    let sur = WorkbookSource.read_grid(&output_dir.join("ruta_consolidado_2.xlsx"), "Consolidado").unwrap();
    assert_eq!(sur.row(1)[0], CellValue::from("Luis"));
}

#[tokio::test]
async fn missing_directory() {
    let root = tempfile::tempdir().unwrap();
    let error = sheet_consolidator::consolidate_directory(&root.path().join("nada"), None, false, 1, &Settings::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DirectoryNotFound);
}

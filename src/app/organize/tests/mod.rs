//! Organizer tests over small staging trees

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

use crate::app::catalog::{Locators, ModuleCatalog, ModuleCode, ModuleRecord};
use crate::app::organize::{FileOrganizer, OrderBy, OrganizeOptions, TransferMode};

struct Fixture {
    _temp_dir: TempDir,
    staging: PathBuf,
    organized: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = tempdir().unwrap();
        let staging = temp_dir.path().join("1_unzipped");
        let organized = temp_dir.path().join("2_ordenado");
        std::fs::create_dir_all(&staging).unwrap();
        Self {
            _temp_dir: temp_dir,
            staging,
            organized,
        }
    }

    fn stage(&self, relative: &str, size: usize) -> PathBuf {
        let path = self.staging.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![b'x'; size]).unwrap();
        path
    }

    fn organizer(&self, options: OrganizeOptions) -> FileOrganizer {
        FileOrganizer::new(self.staging.clone(), self.organized.clone(), options)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.organized)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    for (year, code, name) in [
        (2014, 1, "Características de la Vivienda y del Hogar"),
        (2014, 3, "Educación (Para personas de 3 años y más)"),
        (2015, 1, "Características de la Vivienda y del Hogar"),
    ] {
        catalog.insert(ModuleRecord {
            year,
            module_code: ModuleCode::from_number(code),
            module_name: name.to_string(),
            period: "Anual".to_string(),
            survey_code: "55".to_string(),
            survey_name: "ENAHO".to_string(),
            ficha: None,
            locators: Locators::default(),
        });
    }
    catalog
}

fn options(order_by: OrderBy, keep_original_names: bool) -> OrganizeOptions {
    OrganizeOptions {
        order_by,
        keep_original_names,
        ..OrganizeOptions::default()
    }
}

#[tokio::test]
async fn test_same_name_data_files_get_zero_based_suffix() {
    let fx = Fixture::new();
    fx.stage("2014_mod_003/parte1/a.csv", 10 * 1024);
    fx.stage("2014_mod_003/parte2/a.csv", 10 * 1024);

    let report = fx
        .organizer(options(OrderBy::ByModule, true))
        .organize(&catalog())
        .await
        .unwrap();

    let mut names: Vec<String> = report
        .files
        .iter()
        .map(|f| fx.relative(&f.destination_path))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "por_modulo/003_educacion/2014.csv",
            "por_modulo/003_educacion/2014_1.csv",
        ]
    );
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_size_rank_orders_largest_first() {
    let fx = Fixture::new();
    let small = fx.stage("2014_mod_001/b.csv", 10);
    let large = fx.stage("2014_mod_001/a.csv", 20);
    let tie = fx.stage("2014_mod_001/c.csv", 10);

    let plan = fx
        .organizer(options(OrderBy::ByModule, false))
        .plan(&catalog())
        .unwrap();

    let destination_of = |source: &Path| {
        let file = plan.moves.iter().find(|m| m.source_path == source).unwrap();
        fx.relative(&file.destination_path)
    };
    let folder = "por_modulo/001_caracteristicas_de_la_vivienda_y_del_hogar";
    assert_eq!(destination_of(&large), format!("{}/2014_1.csv", folder));
    assert_eq!(destination_of(&small), format!("{}/2014_2.csv", folder));
    assert_eq!(destination_of(&tie), format!("{}/2014_3.csv", folder));
}

#[tokio::test]
async fn test_by_year_layouts() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/Enaho01-2014-100.CSV", 5);
    fx.stage("2015_mod_001/Enaho01-2015-100.dta", 5);

    let renamed = fx
        .organizer(options(OrderBy::ByYear, false))
        .plan(&catalog())
        .unwrap();
    let mut names: Vec<String> = renamed
        .moves
        .iter()
        .map(|m| fx.relative(&m.destination_path))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "por_anio/2014/001_caracteristicas_de_la_vivienda_y_del_hogar_1.csv",
            "por_anio/2015/001_caracteristicas_de_la_vivienda_y_del_hogar_1.dta",
        ]
    );

    let kept = fx
        .organizer(options(OrderBy::ByYear, true))
        .plan(&catalog())
        .unwrap();
    let mut names: Vec<String> = kept
        .moves
        .iter()
        .map(|m| fx.relative(&m.destination_path))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "por_anio/2014/2014_enaho01-2014-100.csv",
            "por_anio/2015/2015_enaho01-2015-100.dta",
        ]
    );
}

#[tokio::test]
async fn test_module_missing_from_catalog_uses_placeholder() {
    let fx = Fixture::new();
    fx.stage("2019_mod_077/datos.sav", 3);

    let plan = fx
        .organizer(options(OrderBy::ByModule, true))
        .plan(&catalog())
        .unwrap();

    assert_eq!(plan.moves.len(), 1);
    assert_eq!(
        fx.relative(&plan.moves[0].destination_path),
        "por_modulo/077_unknown/2019.sav"
    );
    assert_eq!(plan.moves[0].module_code, Some(ModuleCode::from_number(77)));
}

#[tokio::test]
async fn test_ignored_and_misplaced_files() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/notas.txt", 3);
    fx.stage("2014_mod_001/tabla_ubigeo.csv", 3);
    fx.stage("otros/suelto.csv", 3);
    fx.stage("2014_mod_001.partial/medio.csv", 3);
    fx.stage("2014_mod_001.partial/Ficha.pdf", 3);

    let plan = fx
        .organizer(options(OrderBy::ByModule, true))
        .plan(&catalog())
        .unwrap();

    assert!(plan.moves.is_empty());
    assert_eq!(plan.unexpected_layout, 1);
}

#[tokio::test]
async fn test_documentation_is_unique_by_name_and_size() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/Manual del Encuestador.pdf", 50);
    fx.stage("2015_mod_001/manual del encuestador.PDF", 50);
    fx.stage("2015_mod_001/Diccionario.pdf", 40);
    fx.stage("2014_mod_001/Diccionario.pdf", 41);

    let report = fx
        .organizer(options(OrderBy::ByModule, true))
        .organize(&catalog())
        .await
        .unwrap();

    let mut docs: Vec<String> = report
        .files
        .iter()
        .filter(|f| f.is_documentation)
        .map(|f| fx.relative(&f.destination_path))
        .collect();
    docs.sort();

    assert_eq!(
        docs,
        vec![
            "documentacion/2014_mod_001_diccionario.pdf",
            "documentacion/2014_mod_001_manual_del_encuestador.pdf",
            "documentacion/2015_mod_001_diccionario.pdf",
        ]
    );
    assert_eq!(report.duplicate_documents, 1);
}

#[tokio::test]
async fn test_documentation_avoids_different_file_on_disk() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/Manual.pdf", 50);
    let doc_dir = fx.organized.join("documentacion");
    std::fs::create_dir_all(&doc_dir).unwrap();
    std::fs::write(doc_dir.join("2014_mod_001_manual.pdf"), b"another document").unwrap();

    let report = fx
        .organizer(options(OrderBy::ByModule, true))
        .organize(&catalog())
        .await
        .unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(
        fx.relative(&report.files[0].destination_path),
        "documentacion/2014_mod_001_manual_1.pdf"
    );
    assert_eq!(
        std::fs::read(doc_dir.join("2014_mod_001_manual.pdf")).unwrap(),
        b"another document"
    );
}

#[tokio::test]
async fn test_documentation_can_be_disabled() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/Manual.pdf", 50);
    fx.stage("2014_mod_001/datos.csv", 5);

    let report = fx
        .organizer(OrganizeOptions {
            organize_documentation: false,
            ..options(OrderBy::ByModule, true)
        })
        .organize(&catalog())
        .await
        .unwrap();

    assert_eq!(report.documentation_count(), 0);
    assert_eq!(report.data_count(), 1);
    assert!(!fx.organized.join("documentacion").exists());
}

#[tokio::test]
async fn test_output_is_collision_free_and_repeatable() {
    let fx = Fixture::new();
    for year in [2014, 2015] {
        for part in ["a", "b", "c"] {
            fx.stage(&format!("{}_mod_001/{}/datos.csv", year, part), 7);
            fx.stage(&format!("{}_mod_001/{}/Ficha.pdf", year, part), 9);
        }
    }

    let organizer = fx.organizer(options(OrderBy::ByModule, false));
    let first = organizer.organize(&catalog()).await.unwrap();
    let second = organizer.organize(&catalog()).await.unwrap();

    let destinations: Vec<PathBuf> = first
        .files
        .iter()
        .map(|f| f.destination_path.clone())
        .collect();
    let unique: HashSet<&PathBuf> = destinations.iter().collect();
    assert_eq!(unique.len(), destinations.len());

    let again: Vec<PathBuf> = second
        .files
        .iter()
        .map(|f| f.destination_path.clone())
        .collect();
    assert_eq!(destinations, again);
    assert_eq!(first.data_count(), 6);
    assert_eq!(first.documentation_count(), 1);
    assert_eq!(first.duplicate_documents, 5);
}

#[tokio::test]
async fn test_move_mode_consumes_staging_files() {
    let fx = Fixture::new();
    let source = fx.stage("2014_mod_003/a.csv", 4);
    let doc = fx.stage("2014_mod_003/Ficha.pdf", 4);

    let report = fx
        .organizer(OrganizeOptions {
            transfer_mode: TransferMode::Move,
            ..options(OrderBy::ByModule, true)
        })
        .organize(&catalog())
        .await
        .unwrap();

    assert_eq!(report.files.len(), 2);
    assert!(!source.exists());
    assert!(!doc.exists());
    for file in &report.files {
        assert!(file.destination_path.is_file());
    }
}

#[tokio::test]
async fn test_later_pass_does_not_overwrite_other_module_file() {
    let fx = Fixture::new();
    let move_options = OrganizeOptions {
        transfer_mode: TransferMode::Move,
        ..options(OrderBy::ByYear, true)
    };
    let organizer = fx.organizer(move_options);
    let kept = fx.organized.join("por_anio/2014/2014_enaho01.csv");

    fx.stage("2014_mod_001/enaho01.csv", 11);
    let first = organizer.organize(&catalog()).await.unwrap();
    assert_eq!(first.files.len(), 1);
    assert_eq!(first.files[0].destination_path, kept);

    // the first source is gone from staging, a different module reuses its name
    fx.stage("2014_mod_003/enaho01.csv", 22);
    let second = organizer.organize(&catalog()).await.unwrap();

    assert_eq!(second.files.len(), 1);
    assert_eq!(
        fx.relative(&second.files[0].destination_path),
        "por_anio/2014/2014_enaho01_1.csv"
    );
    assert_eq!(std::fs::metadata(&kept).unwrap().len(), 11);
    assert_eq!(
        std::fs::metadata(&second.files[0].destination_path)
            .unwrap()
            .len(),
        22
    );
}

#[tokio::test]
async fn test_unrecorded_file_on_disk_is_left_alone() {
    let fx = Fixture::new();
    fx.stage("2014_mod_001/datos.csv", 5);
    let folder = fx
        .organized
        .join("por_modulo/001_caracteristicas_de_la_vivienda_y_del_hogar");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("2014_1.csv"), b"mine").unwrap();

    let report = fx
        .organizer(options(OrderBy::ByModule, false))
        .organize(&catalog())
        .await
        .unwrap();

    assert_eq!(report.data_count(), 1);
    assert_eq!(
        fx.relative(&report.files[0].destination_path),
        "por_modulo/001_caracteristicas_de_la_vivienda_y_del_hogar/2014_1_1.csv"
    );
    assert_eq!(std::fs::read(folder.join("2014_1.csv")).unwrap(), b"mine");
}

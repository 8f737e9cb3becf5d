//! Loading of prepared sewer files into the database.
//!
//! Every file maps to one collection `<prefix>.<suffix>`, the suffix is derived from the file
//! name. Collections are dropped before loading, so only complete datasets should be loaded.

use std::path::{Path, PathBuf};

use mongodb::bson::{self, Document};

use crate::{
    dirs::list_files_with_suffix,
    error::{EtlError, EtlResult, InsertFailure},
    geofile::geojson::read_feature_collection,
};

use super::store::DocumentStore;

const MAX_LOGGED_MESSAGE_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollectionKind {
    Shafts,
    ShaftsBboxInfo,
    ShaftLines,
    ShaftLinesBboxInfo,
    Pipes,
    PipesBboxInfo,
    Polygons,
    PolygonsBboxInfo,
}

/// Checked in order, the first contained pattern decides.
const FILENAME_PATTERNS: [(&str, CollectionKind); 8] = [
    ("point.geojson", CollectionKind::Shafts),
    ("point.bboxInfo.json", CollectionKind::ShaftsBboxInfo),
    ("point_as_lines.geojson", CollectionKind::ShaftLines),
    ("point_as_lines.bboxInfo.json", CollectionKind::ShaftLinesBboxInfo),
    ("line.geojson", CollectionKind::Pipes),
    ("line.bboxInfo.json", CollectionKind::PipesBboxInfo),
    ("polygon.geojson", CollectionKind::Polygons),
    ("polygon.bboxInfo.json", CollectionKind::PolygonsBboxInfo),
];

impl CollectionKind {
    pub fn from_filename(filename: &str) -> EtlResult<Self> {
        FILENAME_PATTERNS
            .iter()
            .find(|(pattern, _)| filename.contains(pattern))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                EtlError::unrecognized(
                    filename,
                    format!(
                        "file name must contain one of {:?} to determine the collection",
                        FILENAME_PATTERNS.map(|(pattern, _)| pattern)
                    ),
                )
            })
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            CollectionKind::Shafts => "shafts",
            CollectionKind::ShaftsBboxInfo => "shafts.bboxInfo",
            CollectionKind::ShaftLines => "shaftsAsLines",
            CollectionKind::ShaftLinesBboxInfo => "shaftsAsLines.bboxInfo",
            CollectionKind::Pipes => "pipes",
            CollectionKind::PipesBboxInfo => "pipes.bboxInfo",
            CollectionKind::Polygons => "polygon",
            CollectionKind::PolygonsBboxInfo => "polygon.bboxInfo",
        }
    }

    pub fn is_bbox_info(&self) -> bool {
        matches!(
            self,
            CollectionKind::ShaftsBboxInfo
                | CollectionKind::ShaftLinesBboxInfo
                | CollectionKind::PipesBboxInfo
                | CollectionKind::PolygonsBboxInfo
        )
    }

    /// Shaft lines are only displayed, never queried spatially.
    pub fn is_spatially_indexed(&self) -> bool {
        !self.is_bbox_info() && *self != CollectionKind::ShaftLines
    }

    pub fn collection_name(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.suffix())
    }
}

/// Outcome of loading one file.
#[derive(Debug, PartialEq)]
pub struct LoadReport {
    pub collection: String,
    pub inserted_count: usize,
    pub failures: Vec<InsertFailure>,
}

/// Files the loader picks up: `*.geojson` and `*.json`, sorted by name.
pub fn list_loadable_files(input_dir: &Path) -> EtlResult<Vec<PathBuf>> {
    let mut filepaths = list_files_with_suffix(input_dir, ".geojson")?;
    filepaths.extend(list_files_with_suffix(input_dir, ".json")?);
    filepaths.sort();
    Ok(filepaths)
}

/// Load every file of `input_dir` into its collection. Rejected documents are logged and
/// reported, every other error aborts.
pub fn load_sewers(
    store: &impl DocumentStore,
    collection_prefix: &str,
    input_dir: &Path,
) -> EtlResult<Vec<LoadReport>> {
    let filepaths = list_loadable_files(input_dir)?;
    if filepaths.is_empty() {
        log::warn!("No files to load in {:?}", input_dir);
    }
    filepaths
        .iter()
        .map(|filepath| load_file(store, collection_prefix, filepath))
        .collect()
}

pub fn load_file(
    store: &impl DocumentStore,
    collection_prefix: &str,
    filepath: &Path,
) -> EtlResult<LoadReport> {
    let filename = filepath
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = CollectionKind::from_filename(&filename)?;
    let collection = kind.collection_name(collection_prefix);

    if store.collection_names()?.contains(&collection) {
        log::info!("Dropping existing collection {}", collection);
        store.drop_collection(&collection)?;
    }

    if kind.is_bbox_info() {
        let geometry_collection = collection.replace(".bboxInfo", "");
        store.insert_one(&collection, bbox_info_document(filepath, &geometry_collection)?)?;
        log::info!("Inserted bounding boxes for {}", geometry_collection);
        return Ok(LoadReport {
            collection,
            inserted_count: 1,
            failures: vec![],
        });
    }

    if kind.is_spatially_indexed() {
        store.create_geo_index(&collection, "geometry")?;
    }
    let documents = feature_documents(filepath)?;
    let num_documents = documents.len();
    match store.insert_many_unordered(&collection, documents) {
        Ok(inserted_count) => {
            log::info!(
                "Collection {}: inserted {} of {} features",
                collection,
                inserted_count,
                num_documents
            );
            Ok(LoadReport {
                collection,
                inserted_count,
                failures: vec![],
            })
        }
        Err(EtlError::PartialInsertFailure {
            collection,
            inserted_count,
            failures,
        }) => {
            log_failures(&collection, inserted_count, &failures);
            Ok(LoadReport {
                collection,
                inserted_count,
                failures,
            })
        }
        Err(err) => Err(err),
    }
}

fn log_failures(collection: &str, inserted_count: usize, failures: &[InsertFailure]) {
    log::error!(
        "Collection {}: {} features could not be inserted, {} were inserted",
        collection,
        failures.len(),
        inserted_count
    );
    for failure in failures {
        let message: String = failure
            .message
            .chars()
            .take(MAX_LOGGED_MESSAGE_CHARS)
            .collect();
        log::error!(
            "Feature {}: error code {}: {}",
            failure.index,
            failure.code,
            message
        );
    }
}

/// The bounding box file as one document, referencing the collection of its geometries.
fn bbox_info_document(filepath: &Path, geometry_collection: &str) -> EtlResult<Document> {
    let contents = std::fs::read_to_string(filepath)?;
    let mut bbox_info: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&contents)?;
    bbox_info.insert(
        "collectionName".to_string(),
        serde_json::Value::from(geometry_collection),
    );
    Ok(bson::to_document(&bbox_info)?)
}

fn feature_documents(filepath: &Path) -> EtlResult<Vec<Document>> {
    read_feature_collection(filepath)?
        .features
        .iter()
        .map(|feature| Ok(bson::to_document(feature)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{BTreeMap, BTreeSet},
        path::Path,
    };

    use geojson::{Feature, Geometry, Value};
    use mongodb::bson::Document;
    use rstest::rstest;
    use serde_json::json;
    use testdir::testdir;

    use crate::{
        error::{EtlError, EtlResult, InsertFailure},
        geofile::{
            feature::new_feature_collection,
            geojson::{write_feature_collection, write_json},
        },
    };

    use super::{load_sewers, CollectionKind, DocumentStore, LoadReport};

    const DUPLICATE_KEY: i32 = 121;

    /// Rejects documents whose properties carry `invalid`, like a schema validation would.
    #[derive(Default)]
    struct InMemoryStore {
        collections: RefCell<BTreeMap<String, Vec<Document>>>,
        geo_indexes: RefCell<BTreeSet<String>>,
    }

    impl InMemoryStore {
        fn documents(&self, collection: &str) -> Vec<Document> {
            self.collections
                .borrow()
                .get(collection)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl DocumentStore for InMemoryStore {
        fn collection_names(&self) -> EtlResult<Vec<String>> {
            Ok(self.collections.borrow().keys().cloned().collect())
        }

        fn drop_collection(&self, collection: &str) -> EtlResult<()> {
            self.collections.borrow_mut().remove(collection);
            self.geo_indexes.borrow_mut().remove(collection);
            Ok(())
        }

        fn create_geo_index(&self, collection: &str, field: &str) -> EtlResult<()> {
            assert_eq!("geometry", field);
            self.collections
                .borrow_mut()
                .entry(collection.to_string())
                .or_default();
            self.geo_indexes.borrow_mut().insert(collection.to_string());
            Ok(())
        }

        fn insert_one(&self, collection: &str, document: Document) -> EtlResult<()> {
            self.collections
                .borrow_mut()
                .entry(collection.to_string())
                .or_default()
                .push(document);
            Ok(())
        }

        fn insert_many_unordered(
            &self,
            collection: &str,
            documents: Vec<Document>,
        ) -> EtlResult<usize> {
            let mut failures = vec![];
            let mut inserted_count = 0;
            let mut collections = self.collections.borrow_mut();
            let stored = collections.entry(collection.to_string()).or_default();
            for (index, document) in documents.into_iter().enumerate() {
                let invalid = document
                    .get_document("properties")
                    .map_or(false, |properties| properties.contains_key("invalid"));
                if invalid {
                    failures.push(InsertFailure {
                        index,
                        code: DUPLICATE_KEY,
                        message: "Document failed validation".repeat(10),
                    });
                } else {
                    stored.push(document);
                    inserted_count += 1;
                }
            }
            if failures.is_empty() {
                Ok(inserted_count)
            } else {
                Err(EtlError::PartialInsertFailure {
                    collection: collection.to_string(),
                    inserted_count,
                    failures,
                })
            }
        }
    }

    fn point(id: u64, invalid: bool) -> Feature {
        let mut feature = Feature::from(Geometry::new(Value::Point(vec![7.0, 51.0, 50.0])));
        feature.properties = json!({ "id": id }).as_object().cloned();
        if invalid {
            feature
                .properties
                .as_mut()
                .unwrap()
                .insert("invalid".to_string(), json!(true));
        }
        feature
    }

    fn write_points(filepath: &Path, features: Vec<Feature>) {
        write_feature_collection(new_feature_collection("sewers_point", 4326, features), filepath)
            .unwrap();
    }

    #[rstest]
    #[case("sewers_point.geojson", "shafts")]
    #[case("sewers_point.bboxInfo.json", "shafts.bboxInfo")]
    #[case("sewers_point_as_lines.geojson", "shaftsAsLines")]
    #[case("sewers_point_as_lines.bboxInfo.json", "shaftsAsLines.bboxInfo")]
    #[case("sewers_line.geojson", "pipes")]
    #[case("sewers_line.bboxInfo.json", "pipes.bboxInfo")]
    #[case("sewers_polygon.geojson", "polygon")]
    #[case("sewers_polygon.bboxInfo.json", "polygon.bboxInfo")]
    fn test_filename_to_suffix(#[case] filename: &str, #[case] suffix: &str) {
        assert_eq!(suffix, CollectionKind::from_filename(filename).unwrap().suffix());
    }

    #[rstest]
    #[case("shafts.geojson")]
    #[case("sewers_points.json")]
    #[case("readme.txt")]
    fn test_unknown_filename_is_rejected(#[case] filename: &str) {
        assert!(matches!(
            CollectionKind::from_filename(filename),
            Err(EtlError::UnrecognizedInput { .. })
        ));
    }

    #[test]
    fn test_only_shaft_lines_have_no_geo_index() {
        assert!(CollectionKind::Shafts.is_spatially_indexed());
        assert!(CollectionKind::Pipes.is_spatially_indexed());
        assert!(CollectionKind::Polygons.is_spatially_indexed());
        assert!(!CollectionKind::ShaftLines.is_spatially_indexed());
        assert!(!CollectionKind::PipesBboxInfo.is_spatially_indexed());
    }

    #[test]
    fn test_load_geometries_and_bbox_info() {
        let dir = testdir!();
        write_points(&dir.join("sewers_point.geojson"), vec![point(1, false), point(2, false)]);
        write_json(
            &json!({"bboxReferences": {"1": {"pMin": [0, 0, 0], "pMax": [1, 1, 1]}}}),
            &dir.join("sewers_point.bboxInfo.json"),
        )
        .unwrap();
        write_points(&dir.join("sewers_point_as_lines.geojson"), vec![point(1, false)]);

        let store = InMemoryStore::default();
        let reports = load_sewers(&store, "sewerData", &dir).unwrap();
        assert_eq!(3, reports.len());

        let shafts = store.documents("sewerData.shafts");
        assert_eq!(2, shafts.len());
        assert_eq!("Feature", shafts[0].get_str("type").unwrap());
        assert_eq!(
            2,
            shafts[1]
                .get_document("properties")
                .unwrap()
                .get_i64("id")
                .unwrap()
        );

        let bbox_info = store.documents("sewerData.shafts.bboxInfo");
        assert_eq!(1, bbox_info.len());
        assert_eq!(
            "sewerData.shafts",
            bbox_info[0].get_str("collectionName").unwrap()
        );
        assert!(bbox_info[0].get_document("bboxReferences").is_ok());

        let geo_indexes = store.geo_indexes.borrow();
        assert!(geo_indexes.contains("sewerData.shafts"));
        assert!(!geo_indexes.contains("sewerData.shaftsAsLines"));
        assert_eq!(1, store.documents("sewerData.shaftsAsLines").len());
    }

    #[test]
    fn test_partial_insert_failure_keeps_other_documents() {
        let dir = testdir!();
        write_points(
            &dir.join("sewers_point.geojson"),
            vec![
                point(1, false),
                point(2, true),
                point(3, false),
                point(4, true),
                point(5, false),
            ],
        );

        let store = InMemoryStore::default();
        let reports = load_sewers(&store, "sewerData", &dir).unwrap();
        let LoadReport {
            collection,
            inserted_count,
            failures,
        } = &reports[0];
        assert_eq!("sewerData.shafts", collection);
        assert_eq!(3, *inserted_count);
        assert_eq!(
            vec![1, 3],
            failures
                .iter()
                .map(|failure| failure.index)
                .collect::<Vec<_>>()
        );
        assert!(failures.iter().all(|failure| failure.code == DUPLICATE_KEY));
        assert_eq!(3, store.documents("sewerData.shafts").len());
    }

    #[test]
    fn test_reloading_replaces_collections() {
        let dir = testdir!();
        write_points(&dir.join("sewers_point.geojson"), vec![point(1, false), point(2, false)]);

        let store = InMemoryStore::default();
        load_sewers(&store, "sewerData", &dir).unwrap();
        load_sewers(&store, "sewerData", &dir).unwrap();
        assert_eq!(2, store.documents("sewerData.shafts").len());
        assert_eq!(vec!["sewerData.shafts"], store.collection_names().unwrap());
    }

    #[test]
    fn test_unknown_file_aborts_loading() {
        let dir = testdir!();
        write_json(&json!({}), &dir.join("notes.json")).unwrap();
        let store = InMemoryStore::default();
        assert!(matches!(
            load_sewers(&store, "sewerData", &dir),
            Err(EtlError::UnrecognizedInput { .. })
        ));
    }
}

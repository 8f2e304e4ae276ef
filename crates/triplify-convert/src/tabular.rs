//! Tabular (TSV/CSV) to RDF conversion.
//!
//! The first column is the entity being described, one row per instance.
//! Every other column becomes an attribute, a category or a relation to
//! another entity, according to a guessed (and user-overridable) column
//! type.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use triplify_common::uri::{encode, encode_to_rdf_uri};
use triplify_common::{Result, TriplifyError};

use crate::abstraction::{AbstractedEntity, AbstractedRelation, RelationKind};
use crate::source_file::quoted;

/// Rows scanned when guessing types and previewing.
pub const PREVIEW_ROWS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "entity_start")]
    EntityStart,
    #[serde(rename = "entity")]
    Entity,
    #[serde(rename = "entitySym")]
    EntitySym,
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "taxon")]
    Taxon,
    #[serde(rename = "ref")]
    Ref,
    #[serde(rename = "strand")]
    Strand,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "goterm")]
    GoTerm,
}

impl ColumnType {
    fn is_entity(&self) -> bool {
        matches!(self, ColumnType::Entity | ColumnType::EntitySym)
    }

    fn is_category(&self) -> bool {
        matches!(
            self,
            ColumnType::Category | ColumnType::Taxon | ColumnType::Ref | ColumnType::Strand
        )
    }
}

const GO_NAMESPACE: &str = "http://purl.obolibrary.org/obo/GO_";

pub struct TabularFile {
    path: PathBuf,
    pub name: String,
    delimiter: u8,
    headers: Vec<String>,
    column_types: Vec<ColumnType>,
    disabled_columns: Vec<usize>,
    key_columns: Vec<usize>,
    uris: Vec<Option<String>>,
}

impl TabularFile {
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let delimiter = if name.to_lowercase().ends_with(".csv") { b',' } else { b'\t' };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(&path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(TriplifyError::Convert(format!("{name}: no header row")));
        }

        let column_count = headers.len();
        Ok(Self {
            path,
            name: name.to_string(),
            delimiter,
            headers,
            column_types: Vec::new(),
            disabled_columns: Vec::new(),
            key_columns: Vec::new(),
            uris: vec![None; column_count],
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn set_column_types(&mut self, types: Vec<ColumnType>) {
        self.column_types = types;
    }

    pub fn set_disabled_columns(&mut self, disabled: Vec<usize>) {
        self.disabled_columns = disabled;
    }

    pub fn set_key_columns(&mut self, keys: Vec<usize>) {
        self.key_columns = keys;
    }

    /// Per-column namespace overrides for generated URIs.
    pub fn set_uris(&mut self, uris: Vec<Option<String>>) {
        let mut uris = uris;
        uris.resize(self.headers.len(), None);
        // A namespace must end with a separator to build valid URIs.
        for uri in uris.iter_mut().flatten() {
            if !uri.ends_with('#') && !uri.ends_with('/') {
                uri.push('/');
            }
        }
        self.uris = uris;
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>> {
        Ok(csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(&self.path)?)
    }

    /// First data rows, column-major (one value list per column).
    pub fn preview(&self) -> Result<Vec<Vec<String>>> {
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); self.headers.len()];
        let mut reader = self.reader()?;
        for record in reader.records().take(PREVIEW_ROWS) {
            let record = record?;
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(record.get(i).unwrap_or_default().to_string());
            }
        }
        Ok(columns)
    }

    /// Guess every column type from the preview values.
    pub fn guess_column_types(&self, preview: &[Vec<String>]) -> Vec<ColumnType> {
        let mut types = vec![ColumnType::EntityStart];
        for (i, header) in self.headers.iter().enumerate().skip(1) {
            let values: &[String] = preview.get(i).map(Vec::as_slice).unwrap_or(&[]);
            types.push(guess_values_type(values, header));
        }
        types
    }

    fn effective_types(&self) -> Vec<ColumnType> {
        if self.column_types.len() == self.headers.len() {
            self.column_types.clone()
        } else {
            let mut types = vec![ColumnType::EntityStart];
            types.resize(self.headers.len(), ColumnType::Text);
            types
        }
    }

    fn entity_label(&self) -> &str {
        header_label(&self.headers[0])
    }

    fn entity_class_uri(&self) -> String {
        encode_to_rdf_uri(self.entity_label(), self.uris[0].as_deref())
    }

    fn is_disabled(&self, column: usize) -> bool {
        self.disabled_columns.contains(&column)
    }

    fn subject_uri(&self, record: &csv::StringRecord) -> String {
        let mut id = record.get(0).unwrap_or_default().trim().to_string();
        for key in &self.key_columns {
            if *key == 0 {
                continue;
            }
            if let Some(value) = record.get(*key) {
                id.push('_');
                id.push_str(value.trim());
            }
        }
        encode_to_rdf_uri(&id, self.uris[0].as_deref())
    }

    /// Content triples, one Turtle block per row.
    pub fn turtle(&self, preview_only: bool) -> Result<Vec<String>> {
        let types = self.effective_types();
        let class_uri = self.entity_class_uri();
        let mut blocks = Vec::new();

        let mut reader = self.reader()?;
        for (row, record) in reader.records().enumerate() {
            if preview_only && row >= PREVIEW_ROWS {
                break;
            }
            let record = record?;
            let label = record.get(0).unwrap_or_default().trim();
            if label.is_empty() {
                continue;
            }
            let subject = self.subject_uri(&record);

            let mut props = vec![
                format!("{} rdf:type {}", subject, class_uri),
                format!("\trdfs:label {}", quoted(label)),
            ];
            let mut extra = Vec::new();

            for (i, header) in self.headers.iter().enumerate().skip(1) {
                if self.is_disabled(i) {
                    continue;
                }
                let value = record.get(i).unwrap_or_default().trim();
                if value.is_empty() {
                    continue;
                }
                let column_type = types[i];
                let predicate = predicate_uri(header);
                let object = match column_type {
                    ColumnType::Numeric | ColumnType::Start | ColumnType::End => {
                        if value.parse::<f64>().is_err() {
                            continue;
                        }
                        value.to_string()
                    }
                    ColumnType::Text | ColumnType::Date => quoted(value),
                    ColumnType::GoTerm => {
                        encode_to_rdf_uri(value.trim_start_matches("GO:"), Some(GO_NAMESPACE))
                    }
                    t if t.is_category() => encode_to_rdf_uri(value, None),
                    _ => encode_to_rdf_uri(value, self.uris[i].as_deref()),
                };
                props.push(format!("\t{} {}", predicate, object));

                // A symmetric relation holds in both directions.
                if column_type == ColumnType::EntitySym {
                    extra.push(format!("{} {} {} .", object, predicate, subject));
                }
            }

            let mut block = format!("{} .", props.join(" ;\n"));
            for line in extra {
                block.push('\n');
                block.push_str(&line);
            }
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Abstraction triples: the entity class and one relation per column.
    pub fn abstraction(&self) -> Vec<String> {
        let types = self.effective_types();
        let class_uri = self.entity_class_uri();
        let mut blocks = Vec::new();

        blocks.push(
            AbstractedEntity::new(self.entity_label(), self.uris[0].as_deref())
                .start_point(true)
                .turtle(),
        );
        if let Some(uri) = &self.uris[0] {
            blocks.push(format!("{} triplify:prefixUri {} .\n", class_uri, quoted(uri)));
        }

        let mut has_start = false;
        let mut has_end = false;
        let mut has_ref = false;

        for (i, header) in self.headers.iter().enumerate().skip(1) {
            if self.is_disabled(i) {
                continue;
            }
            let label = header_label(header);
            let (kind, range) = match types[i] {
                ColumnType::Entity | ColumnType::EntitySym => (
                    RelationKind::Object,
                    encode_to_rdf_uri(header_target(header), self.uris[i].as_deref()),
                ),
                ColumnType::GoTerm => (RelationKind::Object, "owl:Class".to_string()),
                t if t.is_category() => {
                    (RelationKind::Object, category_class_uri(header, t))
                }
                ColumnType::Numeric | ColumnType::Start | ColumnType::End => {
                    (RelationKind::Datatype, "xsd:decimal".to_string())
                }
                _ => (RelationKind::Datatype, "xsd:string".to_string()),
            };
            match types[i] {
                ColumnType::Start => has_start = true,
                ColumnType::End => has_end = true,
                ColumnType::Ref => has_ref = true,
                _ => {}
            }
            blocks.push(
                AbstractedRelation::from_uri(&predicate_uri(header), kind, label, &class_uri, &range)
                    .order(i)
                    .turtle(),
            );
        }

        if has_start && has_end && has_ref {
            blocks.push(format!(
                "{} triplify:positionable \"true\"^^xsd:boolean .\n",
                class_uri
            ));
        }

        blocks
    }

    /// Domain-knowledge triples: category members and their labels.
    pub fn domain_knowledge(&self) -> Result<Vec<String>> {
        let types = self.effective_types();
        let mut blocks = Vec::new();

        for (i, header) in self.headers.iter().enumerate().skip(1) {
            if self.is_disabled(i) || !types[i].is_category() {
                continue;
            }
            let class_uri = category_class_uri(header, types[i]);
            let mut seen = BTreeSet::new();
            let mut reader = self.reader()?;
            for record in reader.records() {
                let record = record?;
                let value = record.get(i).unwrap_or_default().trim().to_string();
                if !value.is_empty() {
                    seen.insert(value);
                }
            }
            for value in seen {
                let member = encode_to_rdf_uri(&value, None);
                blocks.push(format!(
                    "{} triplify:category {} .\n{} rdfs:label {} .",
                    class_uri,
                    member,
                    member,
                    quoted(&value)
                ));
            }
        }
        Ok(blocks)
    }
}

/// Part of a header before the `@` separator, the displayed label.
fn header_label(header: &str) -> &str {
    header.split('@').next().unwrap_or(header)
}

/// Target entity of a relation column (`linked_to@Gene` points at Gene).
fn header_target(header: &str) -> &str {
    header.split('@').nth(1).unwrap_or(header)
}

fn predicate_uri(header: &str) -> String {
    format!(":{}", encode(header_label(header)))
}

fn category_class_uri(header: &str, column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Taxon => ":taxonCategory".to_string(),
        ColumnType::Ref => ":refCategory".to_string(),
        ColumnType::Strand => ":strandCategory".to_string(),
        _ => format!(":{}Category", encode(header_label(header))),
    }
}

/// Guess a column type from its header and preview values.
pub fn guess_values_type(values: &[String], header: &str) -> ColumnType {
    if header.contains('@') {
        return ColumnType::Entity;
    }
    match header.to_lowercase().as_str() {
        "taxon" | "species" | "organism" => return ColumnType::Taxon,
        "ref" | "chrom" | "chromosome" => return ColumnType::Ref,
        "strand" => return ColumnType::Strand,
        "start" | "begin" => return ColumnType::Start,
        "end" | "stop" => return ColumnType::End,
        _ => {}
    }

    let filled: Vec<&String> = values.iter().filter(|v| !v.trim().is_empty()).collect();
    if filled.is_empty() {
        return ColumnType::Text;
    }
    if filled.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        return ColumnType::Numeric;
    }
    if filled.iter().all(|v| v.starts_with("GO:")) {
        return ColumnType::GoTerm;
    }
    if filled.iter().all(|v| looks_like_date(v)) {
        return ColumnType::Date;
    }

    // Few distinct values over many rows reads as a category.
    let distinct: BTreeSet<&str> = filled.iter().map(|v| v.trim()).collect();
    if filled.len() >= 2 && distinct.len() * 2 <= filled.len() {
        return ColumnType::Category;
    }

    ColumnType::Text
}

fn looks_like_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
        || chrono::NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &str, name: &str) -> (tempfile::TempDir, TabularFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        let file = TabularFile::open(&path, name).unwrap();
        (dir, file)
    }

    const GENES: &str = "Gene\torganism\tstart\tend\tref\tlinked_to@Gene\n\
                         BRCA1\thuman\t100\t200\tchr17\tBRCA2\n\
                         BRCA2\thuman\t300\t400\tchr13\t\n";

    #[test]
    fn headers_and_preview_are_column_major() {
        let (_d, file) = fixture(GENES, "genes.tsv");
        assert_eq!(file.headers()[0], "Gene");
        let preview = file.preview().unwrap();
        assert_eq!(preview[0], vec!["BRCA1", "BRCA2"]);
        assert_eq!(preview[2], vec!["100", "300"]);
    }

    #[test]
    fn guessing_recognizes_positions_and_relations() {
        let (_d, file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        assert_eq!(
            types,
            vec![
                ColumnType::EntityStart,
                ColumnType::Taxon,
                ColumnType::Start,
                ColumnType::End,
                ColumnType::Ref,
                ColumnType::Entity,
            ]
        );
    }

    #[test]
    fn turtle_emits_one_block_per_row() {
        let (_d, mut file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        file.set_column_types(types);

        let blocks = file.turtle(false).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains(":BRCA1 rdf:type :Gene"));
        assert!(blocks[0].contains("rdfs:label \"BRCA1\""));
        assert!(blocks[0].contains(":start 100"));
        assert!(blocks[0].contains(":linked_to :BRCA2"));
        // Empty relation cell on the second row emits nothing.
        assert!(!blocks[1].contains(":linked_to"));
    }

    #[test]
    fn abstraction_declares_positionable_entity() {
        let (_d, mut file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        file.set_column_types(types);

        let blocks = file.abstraction();
        let joined = blocks.join("\n");
        assert!(joined.contains(":Gene rdf:type owl:Class"));
        assert!(joined.contains("triplify:startPoint"));
        assert!(joined.contains(":linked_to rdf:type owl:ObjectProperty"));
        assert!(joined.contains("rdfs:range :Gene"));
        assert!(joined.contains("rdfs:range :taxonCategory"));
        assert!(joined.contains(":Gene triplify:positionable"));
    }

    #[test]
    fn domain_knowledge_lists_distinct_category_members() {
        let (_d, mut file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        file.set_column_types(types);

        let blocks = file.domain_knowledge().unwrap();
        let joined = blocks.join("\n");
        assert!(joined.contains(":taxonCategory triplify:category :human"));
        assert!(joined.contains(":human rdfs:label \"human\""));
        // Two rows, one distinct taxon value.
        assert_eq!(joined.matches(":taxonCategory triplify:category").count(), 1);
    }

    #[test]
    fn disabled_columns_are_skipped() {
        let (_d, mut file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        file.set_column_types(types);
        file.set_disabled_columns(vec![1]);

        let blocks = file.turtle(false).unwrap();
        assert!(!blocks[0].contains(":organism"));
        let joined = file.abstraction().join("\n");
        assert!(!joined.contains(":organism rdf:type"));
    }

    #[test]
    fn key_columns_extend_the_subject() {
        let (_d, mut file) = fixture(GENES, "genes.tsv");
        let preview = file.preview().unwrap();
        let types = file.guess_column_types(&preview);
        file.set_column_types(types);
        file.set_key_columns(vec![4]);

        let blocks = file.turtle(false).unwrap();
        assert!(blocks[0].contains(":BRCA1_chr17 rdf:type :Gene"));
    }

    #[test]
    fn symmetric_relations_go_both_ways() {
        let content = "Protein\tinteracts_with@Protein\nP1\tP2\n";
        let (_d, mut file) = fixture(content, "ppi.tsv");
        file.set_column_types(vec![ColumnType::EntityStart, ColumnType::EntitySym]);

        let blocks = file.turtle(false).unwrap();
        assert!(blocks[0].contains(":P1 rdf:type :Protein"));
        assert!(blocks[0].contains("\t:interacts_with :P2"));
        assert!(blocks[0].contains(":P2 :interacts_with :P1 ."));
    }

    #[test]
    fn csv_delimiter_follows_the_extension() {
        let content = "Gene,desc\nBRCA1,repair\n";
        let (_d, mut file) = fixture(content, "genes.csv");
        file.set_column_types(vec![ColumnType::EntityStart, ColumnType::Text]);
        let blocks = file.turtle(false).unwrap();
        assert!(blocks[0].contains(":desc \"repair\""));
    }

    #[test]
    fn numeric_guess_requires_every_value() {
        let values: Vec<String> = vec!["1".into(), "2".into(), "x".into()];
        assert_eq!(guess_values_type(&values, "score"), ColumnType::Text);
        let values: Vec<String> = vec!["1".into(), "2.5".into()];
        assert_eq!(guess_values_type(&values, "score"), ColumnType::Numeric);
    }

    #[test]
    fn category_guess_needs_repetition() {
        let values: Vec<String> =
            vec!["a".into(), "a".into(), "b".into(), "b".into(), "a".into(), "b".into()];
        assert_eq!(guess_values_type(&values, "type"), ColumnType::Category);
        let values: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(guess_values_type(&values, "type"), ColumnType::Text);
    }

    #[test]
    fn dates_are_recognized() {
        let values: Vec<String> = vec!["2024-01-01".into(), "2024-06-30".into()];
        assert_eq!(guess_values_type(&values, "published"), ColumnType::Date);
    }
}

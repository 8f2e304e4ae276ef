//! GFF3 to RDF conversion.
//!
//! Nine tab-separated columns, `#` comments. The user picks which feature
//! types (gene, mRNA, ...) become entities; every selected feature turns
//! into a positionable instance with reference, start, end and strand,
//! and `Parent` attributes become relations between feature types.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use triplify_common::uri::encode_to_rdf_uri;
use triplify_common::{Result, TriplifyError};

use crate::abstraction::{AbstractedEntity, AbstractedRelation, RelationKind};
use crate::source_file::quoted;

#[derive(Debug, Clone)]
struct Feature {
    ty: String,
    id: String,
    label: String,
    seqid: String,
    start: String,
    end: String,
    strand: String,
    parents: Vec<String>,
}

#[derive(Debug, Default)]
struct GffScan {
    features: Vec<Feature>,
    /// (child type, parent type) pairs seen via Parent attributes.
    parent_links: BTreeSet<(String, String)>,
    refs: BTreeSet<String>,
    strands: BTreeSet<String>,
}

pub struct GffFile {
    path: PathBuf,
    pub name: String,
    taxon: String,
    entities: Vec<String>,
    uri: Option<String>,
}

impl GffFile {
    pub fn open(path: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: name.to_string(),
            taxon: String::new(),
            entities: Vec::new(),
            uri: None,
        }
    }

    pub fn set_taxon(&mut self, taxon: &str) {
        self.taxon = taxon.to_string();
    }

    /// Feature types to integrate.
    pub fn set_entities(&mut self, entities: Vec<String>) {
        self.entities = entities;
    }

    pub fn set_uri(&mut self, uri: Option<String>) {
        self.uri = uri.map(|mut u| {
            if !u.ends_with('#') && !u.ends_with('/') {
                u.push('/');
            }
            u
        });
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>> {
        Ok(csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(&self.path)?)
    }

    /// Distinct feature types of the file, for the integration form.
    pub fn feature_types(&self) -> Result<Vec<String>> {
        let mut types = BTreeSet::new();
        let mut reader = self.reader()?;
        for record in reader.records() {
            let record = record?;
            if let Some(ty) = record.get(2) {
                if !ty.trim().is_empty() {
                    types.insert(ty.trim().to_string());
                }
            }
        }
        if types.is_empty() {
            return Err(TriplifyError::Convert(format!(
                "{}: no features found, is this GFF3?",
                self.name
            )));
        }
        Ok(types.into_iter().collect())
    }

    fn scan(&self) -> Result<GffScan> {
        let selected: BTreeSet<&str> = self.entities.iter().map(String::as_str).collect();
        let mut scan = GffScan::default();
        let mut id_to_type: BTreeMap<String, String> = BTreeMap::new();
        let mut anonymous = 0u64;

        let mut reader = self.reader()?;
        for record in reader.records() {
            let record = record?;
            if record.len() < 8 {
                continue;
            }
            let ty = record.get(2).unwrap_or_default().trim().to_string();
            if ty.is_empty() {
                continue;
            }

            let attributes = parse_attributes(record.get(8).unwrap_or_default());
            let id = attributes.get("ID").cloned().unwrap_or_else(|| {
                anonymous += 1;
                format!("{}_{}", ty, anonymous)
            });
            id_to_type.insert(id.clone(), ty.clone());

            if !selected.contains(ty.as_str()) {
                continue;
            }

            let label = attributes
                .get("Name")
                .cloned()
                .unwrap_or_else(|| id.clone());
            let seqid = record.get(0).unwrap_or_default().trim().to_string();
            let strand = strand_name(record.get(6).unwrap_or_default());

            scan.refs.insert(seqid.clone());
            scan.strands.insert(strand.clone());
            scan.features.push(Feature {
                ty,
                id,
                label,
                seqid,
                start: record.get(3).unwrap_or_default().trim().to_string(),
                end: record.get(4).unwrap_or_default().trim().to_string(),
                strand,
                parents: attributes
                    .get("Parent")
                    .map(|p| p.split(',').map(str::to_string).collect())
                    .unwrap_or_default(),
            });
        }

        // Parent attributes may point forward in the file, so links are
        // resolved after the full pass.
        for feature in &scan.features {
            for parent in &feature.parents {
                if let Some(parent_type) = id_to_type.get(parent) {
                    scan.parent_links
                        .insert((feature.ty.clone(), parent_type.clone()));
                }
            }
        }

        if scan.features.is_empty() {
            return Err(TriplifyError::Convert(format!(
                "{}: no feature matches the selected entities",
                self.name
            )));
        }
        Ok(scan)
    }

    /// Content triples, one block per selected feature.
    pub fn turtle(&self) -> Result<Vec<String>> {
        let scan = self.scan()?;
        let mut blocks = Vec::new();

        for feature in &scan.features {
            let subject = encode_to_rdf_uri(&feature.id, self.uri.as_deref());
            let class = encode_to_rdf_uri(&feature.ty, self.uri.as_deref());
            let mut props = vec![
                format!("{} rdf:type {}", subject, class),
                format!("\trdfs:label {}", quoted(&feature.label)),
                format!("\t:ref {}", encode_to_rdf_uri(&feature.seqid, None)),
                format!("\t:strand {}", encode_to_rdf_uri(&feature.strand, None)),
            ];
            if !self.taxon.is_empty() {
                props.push(format!("\t:taxon {}", encode_to_rdf_uri(&self.taxon, None)));
            }
            if feature.start.parse::<u64>().is_ok() {
                props.push(format!("\t:start {}", feature.start));
            }
            if feature.end.parse::<u64>().is_ok() {
                props.push(format!("\t:end {}", feature.end));
            }
            for parent in &feature.parents {
                props.push(format!(
                    "\t:part_of {}",
                    encode_to_rdf_uri(parent, self.uri.as_deref())
                ));
            }
            blocks.push(format!("{} .", props.join(" ;\n")));
        }
        Ok(blocks)
    }

    /// Abstraction triples for every selected feature type.
    pub fn abstraction(&self) -> Result<Vec<String>> {
        let scan = self.scan()?;
        let mut blocks = Vec::new();

        for ty in &self.entities {
            let entity = AbstractedEntity::new(ty, self.uri.as_deref()).start_point(true);
            let class_uri = entity.uri().to_string();
            blocks.push(entity.turtle());
            blocks.push(format!(
                "{} triplify:positionable \"true\"^^xsd:boolean .\n",
                class_uri
            ));

            for (label, kind, range) in [
                ("taxon", RelationKind::Object, ":taxonCategory"),
                ("ref", RelationKind::Object, ":refCategory"),
                ("strand", RelationKind::Object, ":strandCategory"),
                ("start", RelationKind::Datatype, "xsd:decimal"),
                ("end", RelationKind::Datatype, "xsd:decimal"),
            ] {
                blocks.push(
                    AbstractedRelation::from_uri(
                        &format!(":{}", label),
                        kind,
                        label,
                        &class_uri,
                        range,
                    )
                    .turtle(),
                );
            }
        }

        for (child, parent) in &scan.parent_links {
            blocks.push(
                AbstractedRelation::from_uri(
                    ":part_of",
                    RelationKind::Object,
                    "part_of",
                    &encode_to_rdf_uri(child, self.uri.as_deref()),
                    &encode_to_rdf_uri(parent, self.uri.as_deref()),
                )
                .turtle(),
            );
        }
        Ok(blocks)
    }

    /// Category members: taxon, references and strands.
    pub fn domain_knowledge(&self) -> Result<Vec<String>> {
        let scan = self.scan()?;
        let mut blocks = Vec::new();

        if !self.taxon.is_empty() {
            blocks.push(category_member(":taxonCategory", &self.taxon));
        }
        for reference in &scan.refs {
            blocks.push(category_member(":refCategory", reference));
        }
        for strand in &scan.strands {
            blocks.push(category_member(":strandCategory", strand));
        }
        Ok(blocks)
    }
}

pub(crate) fn category_member(class_uri: &str, value: &str) -> String {
    let member = encode_to_rdf_uri(value, None);
    format!(
        "{} triplify:category {} .\n{} rdfs:label {} .",
        class_uri,
        member,
        member,
        quoted(value)
    )
}

pub(crate) fn strand_name(raw: &str) -> String {
    match raw.trim() {
        "+" => "plus".to_string(),
        "-" => "minus".to_string(),
        _ => "unknown".to_string(),
    }
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some((key.trim().to_string(), value.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GFF: &str = "##gff-version 3\n\
        chr1\ttest\tgene\t100\t900\t.\t+\t.\tID=gene1;Name=BRCA1\n\
        chr1\ttest\tmRNA\t100\t900\t.\t+\t.\tID=mrna1;Parent=gene1\n\
        chr2\ttest\tgene\t2000\t2500\t.\t-\t.\tID=gene2\n";

    fn fixture() -> (tempfile::TempDir, GffFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.gff3");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(GFF.as_bytes()).unwrap();
        (dir, GffFile::open(&path, "test.gff3"))
    }

    #[test]
    fn feature_types_are_listed() {
        let (_d, file) = fixture();
        assert_eq!(file.feature_types().unwrap(), vec!["gene", "mRNA"]);
    }

    #[test]
    fn selected_features_become_positioned_entities() {
        let (_d, mut file) = fixture();
        file.set_entities(vec!["gene".to_string()]);
        file.set_taxon("human");

        let blocks = file.turtle().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains(":gene1 rdf:type :gene"));
        assert!(blocks[0].contains("rdfs:label \"BRCA1\""));
        assert!(blocks[0].contains(":ref :chr1"));
        assert!(blocks[0].contains(":strand :plus"));
        assert!(blocks[0].contains(":start 100"));
        assert!(blocks[0].contains(":taxon :human"));
        assert!(blocks[1].contains(":gene2 rdf:type :gene"));
        assert!(blocks[1].contains(":strand :minus"));
        // gene2 has no Name attribute, the ID is the label.
        assert!(blocks[1].contains("rdfs:label \"gene2\""));
    }

    #[test]
    fn parent_attribute_links_feature_types() {
        let (_d, mut file) = fixture();
        file.set_entities(vec!["gene".to_string(), "mRNA".to_string()]);

        let blocks = file.turtle().unwrap();
        let mrna = blocks.iter().find(|b| b.contains(":mrna1")).unwrap();
        assert!(mrna.contains(":part_of :gene1"));

        let abstraction = file.abstraction().unwrap().join("\n");
        assert!(abstraction.contains(":part_of rdf:type owl:ObjectProperty"));
        assert!(abstraction.contains("rdfs:domain :mRNA"));
        assert!(abstraction.contains("rdfs:range :gene"));
    }

    #[test]
    fn domain_knowledge_covers_refs_and_strands() {
        let (_d, mut file) = fixture();
        file.set_entities(vec!["gene".to_string()]);
        file.set_taxon("human");

        let joined = file.domain_knowledge().unwrap().join("\n");
        assert!(joined.contains(":refCategory triplify:category :chr1"));
        assert!(joined.contains(":refCategory triplify:category :chr2"));
        assert!(joined.contains(":strandCategory triplify:category :plus"));
        assert!(joined.contains(":taxonCategory triplify:category :human"));
    }

    #[test]
    fn unselected_entities_are_an_error() {
        let (_d, mut file) = fixture();
        file.set_entities(vec!["exon".to_string()]);
        assert!(matches!(file.turtle(), Err(TriplifyError::Convert(_))));
    }
}

//! BED to RDF conversion.
//!
//! Three mandatory columns (chrom, start, end) and up to three used
//! optional ones (name, score, strand). Every line becomes an instance of
//! a single user-named entity.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use triplify_common::uri::encode_to_rdf_uri;
use triplify_common::{Result, TriplifyError};

use crate::abstraction::{AbstractedEntity, AbstractedRelation, RelationKind};
use crate::gff::{category_member, strand_name};
use crate::source_file::quoted;

pub struct BedFile {
    path: PathBuf,
    pub name: String,
    taxon: String,
    entity_name: String,
    uri: Option<String>,
}

impl BedFile {
    pub fn open(path: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: name.to_string(),
            taxon: String::new(),
            entity_name: "bed_feature".to_string(),
            uri: None,
        }
    }

    pub fn set_taxon(&mut self, taxon: &str) {
        self.taxon = taxon.to_string();
    }

    pub fn set_entity_name(&mut self, entity_name: &str) {
        if !entity_name.trim().is_empty() {
            self.entity_name = entity_name.trim().to_string();
        }
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

    /// Cheap validity check for the preview endpoint.
    pub fn check(&self) -> Result<()> {
        let mut reader = self.reader()?;
        for record in reader.records() {
            let record = record?;
            if record.len() < 3
                || record.get(1).unwrap_or_default().parse::<u64>().is_err()
                || record.get(2).unwrap_or_default().parse::<u64>().is_err()
            {
                return Err(TriplifyError::Convert(format!(
                    "{}: not a valid BED file",
                    self.name
                )));
            }
            return Ok(());
        }
        Err(TriplifyError::Convert(format!("{}: empty file", self.name)))
    }

    pub fn turtle(&self) -> Result<Vec<String>> {
        let class = encode_to_rdf_uri(&self.entity_name, self.uri.as_deref());
        let mut blocks = Vec::new();

        let mut reader = self.reader()?;
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() < 3 {
                return Err(TriplifyError::Convert(format!(
                    "{}: line {} has fewer than 3 columns",
                    self.name,
                    index + 1
                )));
            }
            let chrom = record.get(0).unwrap_or_default().trim().to_string();
            let start = record.get(1).unwrap_or_default().trim().to_string();
            let end = record.get(2).unwrap_or_default().trim().to_string();
            if start.parse::<u64>().is_err() || end.parse::<u64>().is_err() {
                return Err(TriplifyError::Convert(format!(
                    "{}: line {} has non-numeric coordinates",
                    self.name,
                    index + 1
                )));
            }

            let label = record
                .get(3)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}_{}", self.entity_name, index + 1));
            let subject = encode_to_rdf_uri(&label, self.uri.as_deref());

            let mut props = vec![
                format!("{} rdf:type {}", subject, class),
                format!("\trdfs:label {}", quoted(&label)),
                format!("\t:ref {}", encode_to_rdf_uri(&chrom, None)),
                format!("\t:start {}", start),
                format!("\t:end {}", end),
            ];
            if !self.taxon.is_empty() {
                props.push(format!("\t:taxon {}", encode_to_rdf_uri(&self.taxon, None)));
            }
            if let Some(score) = record.get(4).map(str::trim).filter(|v| !v.is_empty() && *v != ".")
            {
                if score.parse::<f64>().is_ok() {
                    props.push(format!("\t:score {}", score));
                }
            }
            if let Some(strand) = record.get(5).map(str::trim).filter(|v| !v.is_empty()) {
                props.push(format!(
                    "\t:strand {}",
                    encode_to_rdf_uri(&strand_name(strand), None)
                ));
            }
            blocks.push(format!("{} .", props.join(" ;\n")));
        }

        if blocks.is_empty() {
            return Err(TriplifyError::Convert(format!("{}: empty file", self.name)));
        }
        Ok(blocks)
    }

    pub fn abstraction(&self) -> Vec<String> {
        let entity = AbstractedEntity::new(&self.entity_name, self.uri.as_deref()).start_point(true);
        let class_uri = entity.uri().to_string();
        let mut blocks = vec![
            entity.turtle(),
            format!("{} triplify:positionable \"true\"^^xsd:boolean .\n", class_uri),
        ];
        for (label, kind, range) in [
            ("taxon", RelationKind::Object, ":taxonCategory"),
            ("ref", RelationKind::Object, ":refCategory"),
            ("strand", RelationKind::Object, ":strandCategory"),
            ("start", RelationKind::Datatype, "xsd:decimal"),
            ("end", RelationKind::Datatype, "xsd:decimal"),
            ("score", RelationKind::Datatype, "xsd:decimal"),
        ] {
            blocks.push(
                AbstractedRelation::from_uri(&format!(":{}", label), kind, label, &class_uri, range)
                    .turtle(),
            );
        }
        blocks
    }

    pub fn domain_knowledge(&self) -> Result<Vec<String>> {
        let mut refs = BTreeSet::new();
        let mut strands = BTreeSet::new();
        let mut reader = self.reader()?;
        for record in reader.records() {
            let record = record?;
            if let Some(chrom) = record.get(0).map(str::trim).filter(|v| !v.is_empty()) {
                refs.insert(chrom.to_string());
            }
            if let Some(strand) = record.get(5).map(str::trim).filter(|v| !v.is_empty()) {
                strands.insert(strand_name(strand));
            }
        }

        let mut blocks = Vec::new();
        if !self.taxon.is_empty() {
            blocks.push(category_member(":taxonCategory", &self.taxon));
        }
        for reference in &refs {
            blocks.push(category_member(":refCategory", reference));
        }
        for strand in &strands {
            blocks.push(category_member(":strandCategory", strand));
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BED: &str = "chr1\t100\t200\tpeak1\t5.5\t+\n\
                       chr2\t300\t400\n";

    fn fixture(content: &str) -> (tempfile::TempDir, BedFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.bed");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, BedFile::open(&path, "peaks.bed"))
    }

    #[test]
    fn lines_become_instances_of_the_chosen_entity() {
        let (_d, mut file) = fixture(BED);
        file.set_entity_name("Peak");
        file.set_taxon("human");

        let blocks = file.turtle().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains(":peak1 rdf:type :Peak"));
        assert!(blocks[0].contains(":score 5.5"));
        assert!(blocks[0].contains(":strand :plus"));
        // Nameless line gets a generated label.
        assert!(blocks[1].contains(":Peak_2 rdf:type :Peak"));
        assert!(!blocks[1].contains(":score"));
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        let (_d, file) = fixture("chr1\tlow\thigh\n");
        assert!(file.check().is_err());
        assert!(matches!(file.turtle(), Err(TriplifyError::Convert(_))));
    }

    #[test]
    fn abstraction_declares_a_positionable_start_point() {
        let (_d, mut file) = fixture(BED);
        file.set_entity_name("Peak");
        let joined = file.abstraction().join("\n");
        assert!(joined.contains(":Peak rdf:type owl:Class"));
        assert!(joined.contains("triplify:positionable"));
        assert!(joined.contains(":score rdf:type owl:DatatypeProperty"));
    }

    #[test]
    fn domain_knowledge_lists_references() {
        let (_d, file) = fixture(BED);
        let joined = file.domain_knowledge().unwrap().join("\n");
        assert!(joined.contains(":refCategory triplify:category :chr1"));
        assert!(joined.contains(":refCategory triplify:category :chr2"));
    }
}

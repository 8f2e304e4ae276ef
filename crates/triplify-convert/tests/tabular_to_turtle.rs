//! End-to-end conversion of a tabular file: guessing, content triples,
//! abstraction and domain knowledge, as the integration handlers chain
//! them.

use std::io::Write;

use triplify_convert::source_file::{count_lines, detect_kind, SourceKind};
use triplify_convert::tabular::{ColumnType, TabularFile};

const DIFFERENTIAL_EXPRESSION: &str = "\
Gene\ttaxon\tchromosome\tstart\tend\tstrand\texpression\tregulated_with@Gene
AT001\tArabidopsis_thaliana\tAt1\t1000\t1500\t+\t12.5\tAT002
AT002\tArabidopsis_thaliana\tAt1\t2000\t2600\t-\t3.1\t
AT003\tArabidopsis_thaliana\tAt2\t500\t900\t+\t8.0\tAT001
";

fn write_fixture(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn tabular_integration_produces_all_three_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "expression.tsv", DIFFERENTIAL_EXPRESSION);

    assert_eq!(detect_kind("expression.tsv", None), Some(SourceKind::Tabular));
    assert_eq!(count_lines(&path).unwrap(), 3);

    let mut file = TabularFile::open(&path, "expression.tsv").unwrap();
    let preview = file.preview().unwrap();
    let types = file.guess_column_types(&preview);
    assert_eq!(
        types,
        vec![
            ColumnType::EntityStart,
            ColumnType::Taxon,
            ColumnType::Ref,
            ColumnType::Start,
            ColumnType::End,
            ColumnType::Strand,
            ColumnType::Numeric,
            ColumnType::Entity,
        ]
    );
    file.set_column_types(types);

    // Content: one block per row, relations only where the cell is set.
    let content = file.turtle(false).unwrap();
    assert_eq!(content.len(), 3);
    assert!(content[0].contains(":AT001 rdf:type :Gene"));
    assert!(content[0].contains(":expression 12.5"));
    assert!(content[0].contains(":regulated_with :AT002"));
    assert!(!content[1].contains(":regulated_with"));
    assert!(content[2].contains(":regulated_with :AT001"));

    // Abstraction: positionable start point plus one property per column.
    let abstraction = file.abstraction().join("\n");
    assert!(abstraction.contains(":Gene rdf:type owl:Class"));
    assert!(abstraction.contains("triplify:startPoint \"true\"^^xsd:boolean"));
    assert!(abstraction.contains(":Gene triplify:positionable \"true\"^^xsd:boolean"));
    assert!(abstraction.contains(":regulated_with rdf:type owl:ObjectProperty"));
    assert!(abstraction.contains(":expression rdf:type owl:DatatypeProperty"));
    assert!(abstraction.contains("rdfs:range :taxonCategory"));

    // Domain knowledge: category members with labels.
    let domain = file.domain_knowledge().unwrap().join("\n");
    assert!(domain.contains(":taxonCategory triplify:category :Arabidopsis_thaliana"));
    assert!(domain.contains(":refCategory triplify:category :At1"));
    assert!(domain.contains(":refCategory triplify:category :At2"));
    assert!(domain.contains(":strandCategory triplify:category"));
}

#[test]
fn disabled_and_key_columns_shape_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "expression.tsv", DIFFERENTIAL_EXPRESSION);

    let mut file = TabularFile::open(&path, "expression.tsv").unwrap();
    let preview = file.preview().unwrap();
    let types = file.guess_column_types(&preview);
    file.set_column_types(types);
    file.set_disabled_columns(vec![6]);
    file.set_key_columns(vec![2]);

    let content = file.turtle(false).unwrap();
    assert!(content[0].contains(":AT001_At1 rdf:type :Gene"));
    assert!(!content[0].contains(":expression"));
    assert!(!file.abstraction().join("\n").contains(":expression rdf:type"));
}

#[test]
fn preview_mode_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut big = String::from("Gene\tscore\n");
    for i in 0..200 {
        big.push_str(&format!("G{}\t{}\n", i, i));
    }
    let path = write_fixture(&dir, "big.tsv", &big);

    let mut file = TabularFile::open(&path, "big.tsv").unwrap();
    file.set_column_types(vec![ColumnType::EntityStart, ColumnType::Numeric]);

    assert_eq!(file.turtle(true).unwrap().len(), 30);
    assert_eq!(file.turtle(false).unwrap().len(), 200);
}

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use gfftool::convert::parse_type_mapping;
use gfftool::sequence::{fasta_header, feature_sequence, write_fasta};
use gfftool::{
    convert_records, ConvertError, ConvertOptions, FilterChain, FilterParams, GffReader,
    IndexedFasta, Summary,
};

const GFF3: &str = "\
##gff-version 3
##sequence-region 1 1 2000
1\tensembl\tgene\t100\t1000\t.\t+\t.\tID=gene:G1;Name=abc;biotype=protein_coding
1\tensembl\tmRNA\t100\t1000\t.\t+\t.\tID=transcript:T1;Parent=gene:G1;Name=abc-201
1\tensembl\texon\t100\t300\t.\t+\t.\tParent=transcript:T1;Name=E1;rank=1
1\tensembl\tCDS\t150\t300\t.\t+\t0\tID=CDS:P1;Parent=transcript:T1
1\tensembl\texon\t701\t1000\t.\t+\t.\tParent=transcript:T1;Name=E2;rank=2
###
##FASTA
>1
ACGT
";

fn convert(content: &str, options: ConvertOptions) -> Result<String, ConvertError> {
    let mut reader = GffReader::from_lines(content.split_inclusive('\n'), options.end_included);
    let mut out = Vec::new();
    convert_records(reader.records()?, &mut out, options)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn gff3_converts_to_gtf_with_lineage() {
    let gtf = convert(GFF3, ConvertOptions::default()).unwrap();
    let lines: Vec<&str> = gtf.lines().collect();
    assert_eq!(lines.len(), 5);

    assert_eq!(
        lines[0],
        "1\tensembl\tgene\t100\t1000\t.\t+\t.\tgene_id \"G1\"; ID \"gene:G1\"; Name \"abc\"; biotype \"protein_coding\""
    );
    for line in &lines[1..] {
        let attrs = line.split('\t').nth(8).unwrap();
        assert!(attrs.starts_with("gene_id \"G1\"; transcript_id \"T1\""), "{line}");
    }
    assert_eq!(lines[3].split('\t').nth(7), Some("0"));
}

#[test]
fn reserved_prefixes_and_type_mapping() {
    let options = ConvertOptions {
        id_prefixes: vec!["gene".into(), "transcript".into()],
        type_mapping: parse_type_mapping(["mRNA:transcript"]).unwrap(),
        ..Default::default()
    };
    let gtf = convert(GFF3, options).unwrap();
    let tx = gtf.lines().nth(1).unwrap();
    assert!(tx.starts_with("1\tensembl\ttranscript\t"));
    assert!(tx.contains("gene_id \"gene:G1\"; transcript_id \"transcript:T1\""));

    let exon = gtf.lines().nth(4).unwrap();
    assert!(exon.contains("gene_id \"gene:G1\"; transcript_id \"transcript:T1\""));
}

#[test]
fn orphan_exon_is_a_lineage_error() {
    let content = "1\tensembl\texon\t100\t300\t.\t+\t.\tParent=transcript:T1\n";
    assert!(matches!(
        convert(content, ConvertOptions::default()),
        Err(ConvertError::MissingLineage { .. })
    ));
}

#[test]
fn malformed_line_aborts_conversion() {
    let content = "1\tensembl\tgene\t100\t1000\t.\t+\t.\tID=gene:G1\n1\tensembl\n";
    assert!(matches!(
        convert(content, ConvertOptions::default()),
        Err(ConvertError::Parse(_))
    ));
}

#[test]
fn gzip_input_stats_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genes.gff3.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(GFF3.as_bytes()).unwrap();
    enc.finish().unwrap();

    let mut reader = GffReader::from_path(&path, true);
    let summary = Summary::from_records(reader.records().unwrap(), true).unwrap();
    assert_eq!(summary.records, 5);
    assert_eq!(summary.types["exon"], 2);
    assert_eq!(summary.strands["+"], 5);
    assert_eq!(reader.metadata()["gff-version"], "3");
    assert_eq!(reader.metadata()["sequence-region"], "1");
}

#[test]
fn filtered_records_become_fasta() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("genome.fa");
    std::fs::write(&fasta, ">chr1\nAACCGGTTAC\n").unwrap();
    std::fs::write(dir.path().join("genome.fa.fai"), "chr1\t10\t6\t10\t11\n").unwrap();

    let annotation = "\
chr1\tsrc\texon\t1\t4\t.\t+\t.\tID=e1
chr1\tsrc\tCDS\t1\t4\t.\t+\t0\tID=c1
chr1\tsrc\texon\t7\t10\t.\t-\t.\tID=e2
";
    let params: FilterParams = serde_json::from_str(r#"{"type": "exon"}"#).unwrap();
    let chain = FilterChain::from_params(&params).unwrap();
    let mut genome = IndexedFasta::from_file(&fasta).unwrap();
    let mut reader = GffReader::from_lines(annotation.lines(), true);

    let mut out = Vec::new();
    for rec in chain.select(reader.records().unwrap()) {
        let (feature, _) = rec.unwrap();
        let seq = feature_sequence(&mut genome, &feature).unwrap();
        write_fasta(&mut out, &fasta_header(&feature, true), &seq).unwrap();
    }
    assert_eq!(
        String::from_utf8(out).unwrap(),
        ">e1 chr1:1-4(+)\nAACC\n>e2 chr1:7-10(-)\nGTAA\n"
    );
}

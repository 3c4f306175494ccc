//! 演示如何在 library 模式下使用 pepmap 映射肽段与序列标签。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_mapping
//! ```

use pepmap::index::corpus::{DecoyParams, ProteinRecord};
use pepmap::index::ProteinIndex;
use pepmap::mapping::TagMapper;
use pepmap::model::peptide_protein_indexes_map;
use pepmap::modification::ModificationRegistry;
use pepmap::params::{PeptideVariantsParams, SearchParams, SequenceMatchingParams};
use pepmap::tag::Tag;
use pepmap::util::aa;

fn main() -> anyhow::Result<()> {
    // 1. 构建蛋白库（附带反向 decoy）
    let proteins = vec![
        ProteinRecord::new("TEST_ACCESSION", "TEST_ACCESSION test protein", "MSAECTQDRXKTAFTEAVLLPHKW"),
        ProteinRecord::new("TAG_TEST", "TAG_TEST tag protein", "TESTMRITESTCKTESTKMELTSESTE"),
    ];
    let index = ProteinIndex::from_proteins(proteins, &DecoyParams::default())?;
    println!("蛋白数（含 decoy）: {}", index.corpus().len());
    for acc in index.accessions() {
        println!("  {}", acc);
    }

    // 2. 歧义匹配：语料中的 X 可匹配任意残基
    let matching = SequenceMatchingParams::indistinguishable();
    let peptide = "ECTQDRGKTAFTEAVLLP";
    let hits = index.match_peptide(peptide, &matching);
    println!("\n匹配 '{}': {} 处", peptide, hits.len());
    for m in &hits {
        println!("  {} @ {}:{}", m.peptide, m.accession, m.index);
    }

    // 3. 带变异匹配：肽段缺少一个 A
    let variants = PeptideVariantsParams::generic(1);
    let peptide = "ECTQDRGKTAFTEVLLP";
    let hits = index.match_with_variants(peptide, &matching, &variants);
    println!("\n变异匹配 '{}': {} 种解释", peptide, hits.len());
    for m in &hits {
        let v = m.variants.as_ref().map(ToString::to_string).unwrap_or_default();
        println!("  {} @ {}:{} [{}]", m.peptide, m.accession, m.index, v);
    }
    for (pep, proteins) in peptide_protein_indexes_map(&hits) {
        println!("  {} -> {:?}", pep, proteins);
    }

    // 4. 标签匹配：<T M(ox) R I> TEST <C(cam) K>
    let mass = |s: &str| aa::sequence_mass(s.as_bytes()).unwrap_or(0.0);
    let tag = Tag::from_gaps(mass("TMRI") + 15.994915, "TEST", mass("CK") + 57.021464);
    let search = SearchParams::default().fixed("Carbamidomethylation of C").variable("Oxidation of M");
    let mapper = TagMapper::new(&index, &search, &ModificationRegistry::default())?;
    let hits = mapper.match_tag(&tag, &matching, &PeptideVariantsParams::no_variants());
    println!("\n标签 '{}': {} 处", tag, hits.len());
    for m in &hits {
        println!("  {} @ {}:{} [{}]", m.peptide, m.accession, m.index, m.modifications_string());
    }

    println!("\n完成！");
    Ok(())
}

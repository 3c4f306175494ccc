//! # pepmap
//!
//! 基于 FM 索引的肽段 / 序列标签到蛋白质的映射库。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：从 FASTA 蛋白库（可附加反向 decoy）构建正向与反向 FM 索引
//! - **精确 / 歧义匹配**：B/J/Z/X 组合残基、I/L 不可区分以及语料 `X` 的通配比例控制
//! - **变异匹配**：带预算的替换 / 插入 / 缺失，替换受替换矩阵约束
//! - **标签匹配**：字面片段与质量缺口交替的序列标签，缺口由残基和修饰质量填充
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use pepmap::index::corpus::{DecoyParams, ProteinRecord};
//! use pepmap::index::ProteinIndex;
//! use pepmap::params::{PeptideVariantsParams, SequenceMatchingParams};
//!
//! let proteins = vec![ProteinRecord::new("TEST_ACCESSION", "test protein", "MSAECTQDRXKTAFTEAVLLPHKW")];
//! let index = ProteinIndex::from_proteins(proteins, &DecoyParams::default())?;
//!
//! let matching = SequenceMatchingParams::indistinguishable();
//! for m in index.match_peptide("ECTQDRGKTAFTEAVLLP", &matching) {
//!     println!("{} {} {}", m.peptide, m.accession, m.index);
//! }
//!
//! let variants = PeptideVariantsParams::generic(1);
//! let found = index.match_with_variants("ECTQDRGKTAFTEVLLP", &matching, &variants);
//! println!("{} mappings with at most one variant", found.len());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`index`]：蛋白语料与 FM 索引（后缀数组、BWT、FM 索引、持久化）
//! - [`mapping`]：精确、变异与标签匹配
//! - [`model`]：映射结果
//! - [`params`]：匹配 / 变异 / 搜索参数
//! - [`modification`]：修饰注册表与位点规则
//! - [`substitution`]：氨基酸替换矩阵
//! - [`tag`]：序列标签
//! - [`io`]：FASTA、查询列表与 TSV
//! - [`util`]：氨基酸字母表、残基质量与遗传密码

pub mod index;
pub mod io;
pub mod mapping;
pub mod model;
pub mod modification;
pub mod params;
pub mod substitution;
pub mod tag;
pub mod util;

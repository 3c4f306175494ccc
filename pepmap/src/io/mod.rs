//! 输入输出：蛋白 FASTA 读取、查询列表读取与 TSV 结果输出。

pub mod fasta;
pub mod query;

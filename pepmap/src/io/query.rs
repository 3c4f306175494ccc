use anyhow::{anyhow, Result};
use std::io::{BufRead, Write};

use crate::model::PeptideProteinMapping;
use crate::tag::Tag;

/// 逐行读取查询：每行一个肽段或标签，空行与 `#` 注释行跳过。
pub struct QueryReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> QueryReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), line_no: 0 }
    }

    /// 最近一次返回的行号（1-based）
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn next_query(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // 只取第一列，便于直接读取带额外列的表格
            let first = line.split('\t').next().unwrap_or(line).trim();
            return Ok(Some(first.to_string()));
        }
    }
}

pub fn read_peptides<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut r = QueryReader::new(reader);
    let mut out = Vec::new();
    while let Some(q) = r.next_query()? {
        out.push(q);
    }
    Ok(out)
}

/// 读取标签列表；任一行无法解析即报错并给出行号。
pub fn read_tags<R: BufRead>(reader: R) -> Result<Vec<(String, Tag)>> {
    let mut r = QueryReader::new(reader);
    let mut out = Vec::new();
    while let Some(q) = r.next_query()? {
        let tag: Tag = q.parse().map_err(|e| anyhow!("line {}: cannot parse tag '{}': {}", r.line_no(), q, e))?;
        out.push((q, tag));
    }
    Ok(out)
}

pub const TSV_HEADER: [&str; 6] = ["query", "peptide", "accession", "index", "modifications", "variants"];

/// 映射结果的 TSV 输出，每条映射一行；含制表符或换行的字段会被加引号。
pub struct TsvWriter<W: Write> {
    wtr: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
        wtr.write_record(TSV_HEADER)?;
        Ok(Self { wtr, rows: 0 })
    }

    pub fn write_mappings(&mut self, query: &str, mappings: &[PeptideProteinMapping]) -> Result<()> {
        for m in mappings {
            let variants = m.variants.as_ref().map(ToString::to_string).unwrap_or_default();
            let index = m.index.to_string();
            let mods = m.modifications_string();
            self.wtr.write_record([query, m.peptide.as_str(), m.accession.as_str(), index.as_str(), mods.as_str(), variants.as_str()])?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W> {
        self.wtr.flush()?;
        self.wtr.into_inner().map_err(|e| anyhow!("cannot flush TSV output: {}", e.error()))
    }
}

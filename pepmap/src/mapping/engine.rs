//! 分支定界搜索引擎。
//!
//! 在 FM 索引上逐字符扩展，同时处理字面片段（匹配 / 替换 / 插入 / 缺失）
//! 与质量缺口（残基 + 修饰的组合填充）。搜索使用显式帧栈，路径记录在节点池中
//! （每个节点只存一步与父节点下标），仅在成功时才还原为完整路径。
//!
//! 同一引擎既可在正向索引上向左扩展，也可在反向索引上向右扩展。

use std::time::Instant;

use crate::index::fm::FMIndex;
use crate::model::{ModificationMatch, Variant, VariantMatch};
use crate::modification::{ModificationSet, Terminus};
use crate::params::{PeptideVariantsParams, SearchLimits};
use crate::util::aa;

use super::MatchTable;

const ROOT: u32 = u32::MAX;

/// 单次查询的节点数 / 时间预算。耗尽后搜索停止，已得到的结果仍然有效。
#[derive(Debug)]
pub(crate) struct SearchBudget {
    max_nodes: u64,
    deadline: Option<Instant>,
    nodes: u64,
    exhausted: bool,
}

impl SearchBudget {
    pub(crate) fn new(limits: &SearchLimits) -> Self {
        Self {
            max_nodes: limits.max_nodes.unwrap_or(u64::MAX),
            deadline: limits.timeout().map(|t| Instant::now() + t),
            nodes: 0,
            exhausted: false,
        }
    }

    #[inline]
    pub(crate) fn tick(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        self.nodes += 1;
        // 每 1024 个节点检查一次时钟
        if self.nodes > self.max_nodes || (self.nodes & 0x3ff == 0 && self.deadline.is_some_and(|d| Instant::now() >= d)) {
            self.exhausted = true;
        }
        !self.exhausted
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn nodes(&self) -> u64 {
        self.nodes
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    /// 正向索引上向 N 端扩展
    Leftward,
    /// 反向索引上向 C 端扩展
    Rightward,
}

#[derive(Debug, Clone)]
pub(crate) enum Component {
    /// 肽段顺序（N → C）的残基
    Literal(Vec<u8>),
    Gap { target: f64, terminus: Option<Terminus> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepKind {
    Match,
    Substitution,
    Insertion,
    Deletion,
    Terminal(Terminus),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub kind: StepKind,
    /// 消耗的语料残基，0 表示未消耗
    pub corpus: u8,
    /// 放入肽段的残基，0 表示未放置
    pub residue: u8,
    pub modification: Option<u16>,
}

impl Step {
    fn new(kind: StepKind, corpus: u8, residue: u8, modification: Option<u16>) -> Self {
        Self { kind, corpus, residue, modification }
    }

    fn terminal(terminus: Terminus, id: u16) -> Self {
        Self::new(StepKind::Terminal(terminus), 0, 0, Some(id))
    }
}

/// 蛋白端点约束，在定位时对命中做最终过滤。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum BoundaryFilter {
    #[default]
    Any,
    Required,
    Excluded,
}

impl BoundaryFilter {
    pub(crate) fn accepts(self, at_boundary: bool) -> bool {
        match self {
            BoundaryFilter::Any => true,
            BoundaryFilter::Required => at_boundary,
            BoundaryFilter::Excluded => !at_boundary,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub subs: u32,
    pub ins: u32,
    pub dels: u32,
    pub x: u32,
    pub var_mods: u32,
    pub residues: u32,
    pub corpus_len: u32,
    /// 最近放置的肽段残基
    pub edge: u8,
    /// 最后一步是缺失且其后尚未放置残基
    pub trailing_del: bool,
}

impl Counters {
    #[inline]
    fn place(&mut self, residue: u8) {
        self.residues += 1;
        self.edge = residue;
        self.trailing_del = false;
    }
}

/// 搜索起点。
#[derive(Clone, Copy, Debug)]
pub(crate) struct Seed {
    pub lo: usize,
    pub hi: usize,
    pub counters: Counters,
    pub protein_start: BoundaryFilter,
    pub protein_end: BoundaryFilter,
}

impl Seed {
    pub(crate) fn full(fm: &FMIndex) -> Self {
        let (lo, hi) = fm.full_range();
        Self {
            lo,
            hi,
            counters: Counters::default(),
            protein_start: BoundaryFilter::Any,
            protein_end: BoundaryFilter::Any,
        }
    }
}

/// 一条成功路径。`steps` 已按肽段顺序（N → C）排列。
#[derive(Debug, Clone)]
pub(crate) struct Emission {
    pub lo: usize,
    pub hi: usize,
    pub steps: Vec<Step>,
    pub counters: Counters,
    pub protein_start: BoundaryFilter,
    pub protein_end: BoundaryFilter,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    comp: u32,
    pos: u32,
    lo: u32,
    hi: u32,
    /// 当前缺口内已消耗的质量
    mass: f64,
    c: Counters,
    node: u32,
    start: BoundaryFilter,
    end: BoundaryFilter,
}

pub(crate) struct Walker<'a> {
    pub fm: &'a FMIndex,
    pub dir: Direction,
    /// 按处理顺序排列的组件
    pub comps: &'a [Component],
    pub table: &'a MatchTable,
    pub variants: &'a PeptideVariantsParams,
    pub mods: &'a ModificationSet,
    pub tolerance: f64,
    pub max_var_mods: usize,
    /// 搜索途中允许的通配数上限
    pub max_x: usize,
    /// 起点左侧仍有组件（标签锚点之前），起点不是肽段端点
    pub interior_start: bool,
}

struct Run<'w, 'a> {
    w: &'w Walker<'a>,
    stack: Vec<Frame>,
    arena: Vec<(Step, u32)>,
    out: Vec<Emission>,
}

impl<'a> Walker<'a> {
    pub(crate) fn run(&self, seed: Seed, budget: &mut SearchBudget) -> Vec<Emission> {
        if seed.lo >= seed.hi {
            return Vec::new();
        }
        let mut run = Run { w: self, stack: Vec::with_capacity(64), arena: Vec::with_capacity(1024), out: Vec::new() };
        run.stack.push(Frame {
            comp: 0,
            pos: 0,
            lo: seed.lo as u32,
            hi: seed.hi as u32,
            mass: 0.0,
            c: seed.counters,
            node: ROOT,
            start: seed.protein_start,
            end: seed.protein_end,
        });
        while let Some(f) = run.stack.pop() {
            if !budget.tick() {
                break;
            }
            run.expand(f);
        }
        run.out
    }

    #[inline]
    fn extend(&self, lo: u32, hi: u32, residue: u8) -> Option<(u32, u32)> {
        let (l, r) = self.fm.extend_left(lo as usize, hi as usize, aa::to_alphabet(residue));
        (l < r).then_some((l as u32, r as u32))
    }

    #[inline]
    fn allows(&self, subs: u32, ins: u32, dels: u32) -> bool {
        self.variants.allows(subs as usize, ins as usize, dels as usize)
    }
}

impl<'w, 'a> Run<'w, 'a> {
    #[inline]
    fn push(&mut self, mut f: Frame, step: Step) {
        self.arena.push((step, f.node));
        f.node = (self.arena.len() - 1) as u32;
        self.stack.push(f);
    }

    fn expand(&mut self, f: Frame) {
        let w = self.w;
        match w.comps.get(f.comp as usize) {
            None => self.emit(f),
            Some(Component::Literal(seq)) => self.literal_step(f, seq),
            Some(Component::Gap { target, terminus }) => self.gap_step(f, *target, *terminus),
        }
    }

    fn emit(&mut self, f: Frame) {
        if f.c.trailing_del || f.c.residues == 0 {
            return;
        }
        let mut steps = Vec::new();
        let mut n = f.node;
        while n != ROOT {
            let (step, parent) = self.arena[n as usize];
            steps.push(step);
            n = parent;
        }
        // 节点链为处理顺序的逆序
        if self.w.dir == Direction::Rightward {
            steps.reverse();
        }
        self.out.push(Emission {
            lo: f.lo as usize,
            hi: f.hi as usize,
            steps,
            counters: f.c,
            protein_start: f.start,
            protein_end: f.end,
        });
    }

    fn literal_step(&mut self, f: Frame, seq: &[u8]) {
        let w = self.w;
        let pos = f.pos as usize;
        if pos == seq.len() {
            self.stack.push(Frame { comp: f.comp + 1, pos: 0, mass: 0.0, ..f });
            return;
        }
        let q = match w.dir {
            Direction::Leftward => seq[seq.len() - 1 - pos],
            Direction::Rightward => seq[pos],
        };
        let next = Frame { pos: f.pos + 1, ..f };

        for c in b'A'..=b'Z' {
            if !w.table.matches(q, c) {
                continue;
            }
            let Some((lo, hi)) = w.extend(f.lo, f.hi, c) else { continue };
            let mut cnt = f.c;
            if w.table.is_wildcard(c) {
                cnt.x += 1;
                if cnt.x as usize > w.max_x {
                    continue;
                }
            }
            cnt.place(c);
            cnt.corpus_len += 1;
            self.push(Frame { lo, hi, c: cnt, ..next }, Step::new(StepKind::Match, c, c, None));
        }

        let c0 = f.c;
        if aa::is_concrete(q) && w.allows(c0.subs + 1, c0.ins, c0.dels) {
            for c in b'A'..=b'Z' {
                if !aa::is_concrete(c) || w.table.matches(q, c) || !w.variants.substitution_matrix.allows(c, q) {
                    continue;
                }
                let Some((lo, hi)) = w.extend(f.lo, f.hi, c) else { continue };
                let mut cnt = c0;
                cnt.subs += 1;
                cnt.place(q);
                cnt.corpus_len += 1;
                self.push(Frame { lo, hi, c: cnt, ..next }, Step::new(StepKind::Substitution, c, q, None));
            }
        }

        // 插入与缺失一样不出现在肽段最外侧
        let first = c0.residues == 0 && !w.interior_start;
        let last = f.comp as usize + 1 == w.comps.len() && pos + 1 == seq.len();
        let outer = first || last;
        if !outer && w.allows(c0.subs, c0.ins + 1, c0.dels) {
            let mut cnt = c0;
            cnt.ins += 1;
            cnt.place(q);
            self.push(Frame { c: cnt, ..next }, Step::new(StepKind::Insertion, 0, q, None));
        }

        self.deletions(f);
    }

    /// 缺失：消耗一个语料残基而不放置肽段残基。不允许出现在肽段最外侧。
    fn deletions(&mut self, f: Frame) {
        let w = self.w;
        let c0 = f.c;
        if c0.residues == 0 || !w.allows(c0.subs, c0.ins, c0.dels + 1) {
            return;
        }
        for c in b'A'..=b'Z' {
            let Some((lo, hi)) = w.extend(f.lo, f.hi, c) else { continue };
            let mut cnt = c0;
            cnt.dels += 1;
            cnt.corpus_len += 1;
            cnt.trailing_del = true;
            self.push(Frame { lo, hi, c: cnt, ..f }, Step::new(StepKind::Deletion, c, 0, None));
        }
    }

    fn gap_step(&mut self, f: Frame, target: f64, terminus: Option<Terminus>) {
        let w = self.w;
        self.complete_gap(f, target, terminus);

        // 负质量终端修饰可能在收尾时把超出的质量拉回来
        let slack = terminus.map_or(0.0, |t| -w.mods.min_terminal_mass(t));
        let limit = target + w.tolerance + slack;

        for c in b'A'..=b'Z' {
            let Some((lo, hi)) = w.extend(f.lo, f.hi, c) else { continue };
            let here = Frame { lo, hi, ..f };
            for &r in w.table.gap_residues(c) {
                let mut cnt = f.c;
                cnt.corpus_len += 1;
                if c == b'X' {
                    cnt.x += 1;
                    if cnt.x as usize > w.max_x {
                        continue;
                    }
                }
                self.place_in_gap(here, cnt, limit, Step::new(StepKind::Match, c, r, None));
            }
            if aa::is_concrete(c) && w.allows(f.c.subs + 1, f.c.ins, f.c.dels) {
                for r in w.variants.substitution_matrix.targets(c) {
                    if !aa::is_concrete(r) {
                        continue;
                    }
                    let mut cnt = f.c;
                    cnt.subs += 1;
                    cnt.corpus_len += 1;
                    self.place_in_gap(here, cnt, limit, Step::new(StepKind::Substitution, c, r, None));
                }
            }
        }

        self.deletions(f);

        if w.allows(f.c.subs, f.c.ins + 1, f.c.dels) {
            for &r in &aa::STANDARD {
                let mut cnt = f.c;
                cnt.ins += 1;
                self.place_in_gap(f, cnt, limit, Step::new(StepKind::Insertion, 0, r, None));
            }
        }
    }

    /// 在缺口内放置残基：fixed 修饰强制施加，variable 修饰产生分支。
    fn place_in_gap(&mut self, f: Frame, mut cnt: Counters, limit: f64, step: Step) {
        let w = self.w;
        let Some(base) = aa::residue_mass(step.residue) else { return };
        cnt.place(step.residue);

        if let Some(id) = w.mods.fixed_on(step.residue) {
            let added = base + w.mods.get(id).mass;
            if added > 0.0 && f.mass + added <= limit {
                self.push(Frame { mass: f.mass + added, c: cnt, ..f }, Step { modification: Some(id), ..step });
            }
            return;
        }

        if f.mass + base <= limit {
            self.push(Frame { mass: f.mass + base, c: cnt, ..f }, step);
        }
        if (cnt.var_mods as usize) < w.max_var_mods {
            for &id in w.mods.variable_on(step.residue) {
                let added = base + w.mods.get(id).mass;
                if added > 0.0 && f.mass + added <= limit {
                    let mut c2 = cnt;
                    c2.var_mods += 1;
                    self.push(Frame { mass: f.mass + added, c: c2, ..f }, Step { modification: Some(id), ..step });
                }
            }
        }
    }

    fn complete_gap(&mut self, f: Frame, target: f64, terminus: Option<Terminus>) {
        let w = self.w;
        let tol = w.tolerance;
        let within = |m: f64| (m - target).abs() <= tol;
        let next = Frame { comp: f.comp + 1, pos: 0, mass: 0.0, ..f };

        let edge = f.c.edge;
        let Some(t) = terminus.filter(|_| edge != 0) else {
            if within(f.mass) {
                self.stack.push(next);
            }
            return;
        };

        let classes: &[BoundaryFilter] = if w.mods.has_protein_terminal(t, edge) {
            &[BoundaryFilter::Required, BoundaryFilter::Excluded]
        } else {
            &[BoundaryFilter::Any]
        };
        for &class in classes {
            if !self.boundary_feasible(f, t, class) {
                continue;
            }
            let mut nf = next;
            match t {
                Terminus::N => nf.start = class,
                Terminus::C => nf.end = class,
            }
            let at_end = class == BoundaryFilter::Required;

            if let Some(id) = w.mods.forced_terminal(t, edge, at_end) {
                if within(f.mass + w.mods.get(id).mass) {
                    self.push(nf, Step::terminal(t, id));
                }
                continue;
            }
            if within(f.mass) {
                self.stack.push(nf);
            }
            if (f.c.var_mods as usize) < w.max_var_mods {
                for id in w.mods.optional_terminal(t, edge, at_end) {
                    if within(f.mass + w.mods.get(id).mass) {
                        let mut nf2 = nf;
                        nf2.c.var_mods += 1;
                        self.push(nf2, Step::terminal(t, id));
                    }
                }
            }
        }
    }

    /// 借助分隔符扩展判断区间内是否存在位于蛋白端点的出现。
    fn boundary_feasible(&self, f: Frame, t: Terminus, class: BoundaryFilter) -> bool {
        let w = self.w;
        let checkable = matches!((t, w.dir), (Terminus::N, Direction::Leftward) | (Terminus::C, Direction::Rightward));
        if class == BoundaryFilter::Any || !checkable {
            return true;
        }
        let (lo, hi) = w.fm.extend_left(f.lo as usize, f.hi as usize, aa::SEPARATOR);
        let at_boundary = hi.saturating_sub(lo);
        match class {
            BoundaryFilter::Required => at_boundary > 0,
            BoundaryFilter::Excluded => at_boundary < (f.hi - f.lo) as usize,
            BoundaryFilter::Any => true,
        }
    }
}

/// 由路径还原出的肽段、变异与修饰。
#[derive(Debug, Clone, Default)]
pub(crate) struct Assembled {
    pub peptide: String,
    pub variants: Vec<VariantMatch>,
    pub modifications: Vec<ModificationMatch>,
}

pub(crate) fn assemble(steps: &[Step], mods: &ModificationSet) -> Assembled {
    let mut out = Assembled::default();
    let mut site = 0usize;
    let mut c_term = Vec::new();
    let modification = |id: u16, site: usize| {
        let m = mods.get(id);
        ModificationMatch { name: m.name.clone(), site, variable: !m.fixed }
    };
    for step in steps {
        match step.kind {
            StepKind::Match | StepKind::Substitution | StepKind::Insertion => {
                out.peptide.push(step.residue as char);
                site += 1;
                let variant = match step.kind {
                    StepKind::Substitution => Some(Variant::Substitution {
                        original: step.corpus as char,
                        substituted: step.residue as char,
                    }),
                    StepKind::Insertion => Some(Variant::Insertion { inserted: step.residue as char }),
                    _ => None,
                };
                if let Some(variant) = variant {
                    out.variants.push(VariantMatch { site, variant });
                }
                if let Some(id) = step.modification {
                    out.modifications.push(modification(id, site));
                }
            }
            StepKind::Deletion => out.variants.push(VariantMatch {
                site: site + 1,
                variant: Variant::Deletion { deleted: step.corpus as char },
            }),
            StepKind::Terminal(Terminus::N) => {
                if let Some(id) = step.modification {
                    out.modifications.push(modification(id, 1));
                }
            }
            StepKind::Terminal(Terminus::C) => c_term.extend(step.modification),
        }
    }
    for id in c_term {
        out.modifications.push(modification(id, site));
    }
    out.modifications.sort_by_key(|m| m.site);
    out
}

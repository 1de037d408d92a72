//! 分段归类流程：按固定顺序把选中实体改挂到语义图层上，并支持逐步回退。
//!
//! 阶段顺序：`RoadEdge → PavementEdge → Drive? ⇄ DriveN → Path? ⇄ PathN →
//! House? ⇄ HouseN → HouseGroup? ⇄ HouseGroupN → 结束`。

use std::fmt;

use cadvision_core::document::Drawing;
use tracing::{debug, info};

use crate::Selection;
use crate::errors::EngineError;

/// 可以无限编号的图层类别，顺序即提问顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Drive,
    Path,
    House,
    HouseGroup,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Drive => "Drive",
            Category::Path => "Path",
            Category::House => "House",
            Category::HouseGroup => "HouseGroup",
        }
    }

    /// 回答“否”之后询问的下一个类别；`HouseGroup` 之后流程结束。
    pub fn next(self) -> Option<Category> {
        match self {
            Category::Drive => Some(Category::Path),
            Category::Path => Some(Category::House),
            Category::House => Some(Category::HouseGroup),
            Category::HouseGroup => None,
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// 目标图层。编号图层以 `{类别, 序号}` 表示，而非拼接好的字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionLayer {
    RoadEdge,
    PavementEdge,
    Numbered { category: Category, index: u32 },
}

impl SectionLayer {
    pub fn layer_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SectionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionLayer::RoadEdge => f.write_str("RoadEdge"),
            SectionLayer::PavementEdge => f.write_str("PavementEdge"),
            SectionLayer::Numbered { category, index } => {
                write!(f, "{}{}", category.as_str(), index)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// 等待选择并确认归入该图层。
    Classify(SectionLayer),
    /// 询问是否还有另一个该类别的对象。
    Prompt(Category),
}

impl Phase {
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("none"),
            Phase::Classify(layer) => write!(f, "{layer}"),
            Phase::Prompt(category) => write!(f, "{}-prompt", category.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters([u32; 4]);

impl Counters {
    #[inline]
    pub fn get(&self, category: Category) -> u32 {
        self.0[category.slot()]
    }

    fn increment(&mut self, category: Category) -> u32 {
        let slot = &mut self.0[category.slot()];
        *slot += 1;
        *slot
    }
}

/// 一次可回退动作之前的完整状态。
#[derive(Debug, Clone)]
struct Snapshot {
    drawing: Drawing,
    selection: Selection,
    phase: Phase,
    counters: Counters,
}

#[derive(Debug, Clone, Default)]
pub struct SectioningSession {
    phase: Phase,
    counters: Counters,
    history: Vec<Snapshot>,
}

impl SectioningSession {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    #[inline]
    pub fn counter(&self, category: Category) -> u32 {
        self.counters.get(category)
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// 进入流程：计数清零、历史清空，从 `RoadEdge` 开始。
    pub fn start(&mut self) -> Phase {
        self.counters = Counters::default();
        self.history.clear();
        self.phase = Phase::Classify(SectionLayer::RoadEdge);
        info!("开始分段归类流程");
        self.phase
    }

    /// 把选中实体改挂到当前阶段的图层，并推进阶段。
    ///
    /// 选择为空（或选中的实体都已不在图纸中）时返回校验错误，状态不变。
    pub fn confirm(
        &mut self,
        drawing: &mut Drawing,
        selection: &mut Selection,
    ) -> Result<Phase, EngineError> {
        let target = match self.phase {
            Phase::Classify(layer) => layer,
            Phase::Idle => return Err(EngineError::SectioningInactive),
            Phase::Prompt(_) => return Err(self.unexpected("confirm")),
        };
        let ids: Vec<_> = selection
            .iter()
            .copied()
            .filter(|id| drawing.contains(*id))
            .collect();
        if ids.is_empty() {
            return Err(EngineError::EmptySelection {
                phase: target.layer_name(),
            });
        }

        self.push_snapshot(drawing, selection);
        let layer_name = target.layer_name();
        for id in &ids {
            drawing.set_entity_layer(*id, layer_name.as_str());
        }
        drawing.promote_layer(&layer_name);
        selection.clear();

        self.phase = match target {
            SectionLayer::RoadEdge => Phase::Classify(SectionLayer::PavementEdge),
            SectionLayer::PavementEdge => Phase::Prompt(Category::Drive),
            SectionLayer::Numbered { category, .. } => Phase::Prompt(category),
        };
        info!(layer = %layer_name, count = ids.len(), next = %self.phase, "实体已归类");
        Ok(self.phase)
    }

    /// 回答当前提问。“是”新开一个编号图层，“否”转向下一个类别；
    /// 最后一个类别回答“否”时流程结束。
    pub fn answer(
        &mut self,
        accept: bool,
        drawing: &Drawing,
        selection: &mut Selection,
    ) -> Result<Phase, EngineError> {
        let category = match self.phase {
            Phase::Prompt(category) => category,
            Phase::Idle => return Err(EngineError::SectioningInactive),
            Phase::Classify(_) => return Err(self.unexpected(if accept { "yes" } else { "no" })),
        };

        if accept {
            self.push_snapshot(drawing, selection);
            let index = self.counters.increment(category);
            self.phase = Phase::Classify(SectionLayer::Numbered { category, index });
        } else if let Some(next) = category.next() {
            self.push_snapshot(drawing, selection);
            self.phase = Phase::Prompt(next);
        } else {
            self.finish(selection);
            info!("分段归类流程完成");
            return Ok(self.phase);
        }
        debug!(accept, phase = %self.phase, "回答分段提问");
        Ok(self.phase)
    }

    /// 弹出最近一次快照并恢复图纸内容与流程状态。历史为空时返回 `false`。
    pub fn go_back(&mut self, drawing: &mut Drawing, selection: &mut Selection) -> bool {
        let Some(snapshot) = self.history.pop() else {
            return false;
        };
        drawing.restore(snapshot.drawing);
        *selection = snapshot.selection;
        self.phase = snapshot.phase;
        self.counters = snapshot.counters;
        debug!(phase = %self.phase, remaining = self.history.len(), "回退一步");
        true
    }

    /// 立即终止流程。已确认的归类不会回滚。
    pub fn cancel(&mut self, selection: &mut Selection) {
        if self.is_active() {
            info!(phase = %self.phase, "取消分段归类流程");
        }
        self.finish(selection);
    }

    fn finish(&mut self, selection: &mut Selection) {
        self.phase = Phase::Idle;
        self.counters = Counters::default();
        self.history.clear();
        selection.clear();
    }

    fn push_snapshot(&mut self, drawing: &Drawing, selection: &Selection) {
        self.history.push(Snapshot {
            drawing: drawing.clone(),
            selection: selection.clone(),
            phase: self.phase,
            counters: self.counters,
        });
    }

    fn unexpected(&self, action: &'static str) -> EngineError {
        EngineError::UnexpectedPhase {
            phase: self.phase.to_string(),
            action,
        }
    }
}

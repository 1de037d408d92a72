pub mod assist;
pub mod command;
pub mod grid;
pub mod picking;
pub mod render;
pub mod sectioning;
pub mod tools;
pub mod viewport;

/// 选中集。有序集合保证遍历顺序稳定。
pub type Selection = std::collections::BTreeSet<cadvision_core::document::EntityId>;

pub mod errors {
    use cadvision_core::document::EntityId;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(EntityId),
        #[error("select at least one entity before confirming {phase}")]
        EmptySelection { phase: String },
        #[error("sectioning workflow is not active")]
        SectioningInactive,
        #[error("phase {phase} does not accept `{action}`")]
        UnexpectedPhase { phase: String, action: &'static str },
        #[error("an analysis request is already in flight")]
        AnalysisInFlight,
        #[error("select exactly one entity to analyze")]
        NothingToAnalyze,
        #[error("unknown tool `{0}`")]
        UnknownTool(String),
    }
}

pub mod scene {
    use cadvision_core::document::{Drawing, Entity, EntityId};
    use cadvision_core::geometry::Point2;
    use glam::DVec2;
    use tracing::{debug, info};

    use crate::Selection;
    use crate::assist::{Analysis, Describer};
    use crate::errors::EngineError;
    use crate::grid::DEFAULT_GRID_MIN_PIXELS;
    use crate::picking::{DEFAULT_PICK_TOLERANCE_PX, pick};
    use crate::render::{Frame, RenderInput, render_frame};
    use crate::sectioning::{Phase, SectioningSession};
    use crate::tools::{DrawingTool, ToolClick, ToolController};
    use crate::viewport::{
        CanvasSize, DEFAULT_TARGET_WORLD_WIDTH, DEFAULT_ZOOM_SENSITIVITY, PinchGesture,
        ScaleLimits, ViewportState, WheelEvent,
    };

    pub const DEFAULT_ZOOM_STEP: f64 = 1.5;

    /// 交互参数，通常由配置文件提供。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ViewSettings {
        pub limits: ScaleLimits,
        pub zoom_sensitivity: f64,
        pub zoom_step: f64,
        pub pick_tolerance_px: f64,
        pub grid_min_pixels: f64,
        pub target_world_width: f64,
    }

    impl Default for ViewSettings {
        fn default() -> Self {
            Self {
                limits: ScaleLimits::default(),
                zoom_sensitivity: DEFAULT_ZOOM_SENSITIVITY,
                zoom_step: DEFAULT_ZOOM_STEP,
                pick_tolerance_px: DEFAULT_PICK_TOLERANCE_PX,
                grid_min_pixels: DEFAULT_GRID_MIN_PIXELS,
                target_world_width: DEFAULT_TARGET_WORLD_WIDTH,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PointerButton {
        Primary,
        Middle,
        Secondary,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Key {
        Escape,
    }

    /// Escape 键实际关闭了什么。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Dismissed {
        Analysis,
        PendingShape,
        Selection,
        Nothing,
    }

    /// 引擎层负责维护 `Drawing` 和运行时状态（选中集、视口、工具、归类流程）。
    #[derive(Debug)]
    pub struct Scene {
        drawing: Drawing,
        selection: Selection,
        hover: Option<EntityId>,
        cursor: Option<Point2>,
        viewport: ViewportState,
        canvas: CanvasSize,
        settings: ViewSettings,
        tools: ToolController,
        sectioning: SectioningSession,
        analysis: Analysis,
        drag_origin: Option<DVec2>,
        pinch: Option<PinchGesture>,
    }

    impl Scene {
        pub fn new(canvas: CanvasSize, settings: ViewSettings) -> Self {
            Self {
                drawing: Drawing::with_user_layer(),
                selection: Selection::new(),
                hover: None,
                cursor: None,
                viewport: ViewportState::standard(
                    canvas,
                    settings.target_world_width,
                    settings.limits,
                ),
                canvas,
                settings,
                tools: ToolController::new(),
                sectioning: SectioningSession::new(),
                analysis: Analysis::default(),
                drag_origin: None,
                pinch: None,
            }
        }

        /// 用已解析的图纸初始化场景。
        pub fn with_drawing(canvas: CanvasSize, settings: ViewSettings, drawing: Drawing) -> Self {
            let mut scene = Self::new(canvas, settings);
            scene.load_drawing(drawing);
            scene
        }

        /// 整体替换图纸（不合并），清空交互状态并回到标准视图。
        pub fn load_drawing(&mut self, drawing: Drawing) {
            info!(
                entities = drawing.len(),
                layers = drawing.layers().count(),
                "载入图纸"
            );
            self.drawing = drawing;
            self.reset_interaction();
            self.reset_view();
        }

        /// 清空画布：仅保留用户绘图图层。
        pub fn clear(&mut self) {
            self.load_drawing(Drawing::with_user_layer());
        }

        fn reset_interaction(&mut self) {
            self.selection.clear();
            self.hover = None;
            self.tools.cancel();
            self.sectioning.cancel(&mut self.selection);
            self.analysis.dismiss();
            self.drag_origin = None;
            self.pinch = None;
        }

        #[inline]
        pub fn drawing(&self) -> &Drawing {
            &self.drawing
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.drawing.entity(id)
        }

        #[inline]
        pub fn settings(&self) -> &ViewSettings {
            &self.settings
        }

        // ---- 选中集 ----

        #[inline]
        pub fn selection(&self) -> &Selection {
            &self.selection
        }

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selection.len()
        }

        #[inline]
        pub fn is_selected(&self, id: EntityId) -> bool {
            self.selection.contains(&id)
        }

        /// 将实体加入选中集。
        pub fn select(&mut self, id: EntityId) -> Result<(), EngineError> {
            if !self.drawing.contains(id) {
                return Err(EngineError::EntityNotFound(id));
            }
            self.selection.insert(id);
            debug!(entity = %id, "选中实体");
            Ok(())
        }

        /// 只选中给定实体。
        pub fn select_only(&mut self, id: EntityId) -> Result<(), EngineError> {
            if !self.drawing.contains(id) {
                return Err(EngineError::EntityNotFound(id));
            }
            self.selection.clear();
            self.selection.insert(id);
            Ok(())
        }

        pub fn clear_selection(&mut self) {
            if !self.selection.is_empty() {
                debug!(count = self.selection.len(), "清空选中集");
            }
            self.selection.clear();
        }

        /// 单选时返回该实体。
        pub fn single_selection(&self) -> Option<(EntityId, &Entity)> {
            if self.selection.len() != 1 {
                return None;
            }
            let id = *self.selection.iter().next()?;
            self.drawing.entity(id).map(|entity| (id, entity))
        }

        #[inline]
        pub fn hovered(&self) -> Option<EntityId> {
            self.hover
        }

        #[inline]
        pub fn cursor_world(&self) -> Option<Point2> {
            self.cursor
        }

        // ---- 视口 ----

        #[inline]
        pub fn viewport(&self) -> ViewportState {
            self.viewport
        }

        #[inline]
        pub fn canvas(&self) -> CanvasSize {
            self.canvas
        }

        /// 画布尺寸变化不影响当前缩放与偏移。
        pub fn resize(&mut self, canvas: CanvasSize) {
            self.canvas = canvas;
        }

        pub fn reset_view(&mut self) {
            self.viewport = ViewportState::standard(
                self.canvas,
                self.settings.target_world_width,
                self.settings.limits,
            );
            debug!(scale = self.viewport.scale(), "视口已复位");
        }

        pub fn zoom_in(&mut self) {
            self.viewport
                .zoom_at(self.canvas.center(), self.settings.zoom_step);
        }

        pub fn zoom_out(&mut self) {
            self.viewport
                .zoom_at(self.canvas.center(), 1.0 / self.settings.zoom_step);
        }

        pub fn zoom_at(&mut self, screen: DVec2, factor: f64) {
            self.viewport.zoom_at(screen, factor);
        }

        pub fn pan_by(&mut self, dx: f64, dy: f64) {
            self.viewport.pan_by(dx, dy);
        }

        pub fn wheel(&mut self, cursor: DVec2, event: WheelEvent) {
            self.viewport
                .apply_wheel(cursor, event, self.settings.zoom_sensitivity);
        }

        pub fn pinch_start(&mut self, first: DVec2, second: DVec2) {
            self.drag_origin = None;
            self.pinch = PinchGesture::begin(self.viewport, first, second);
        }

        pub fn pinch_move(&mut self, first: DVec2, second: DVec2) {
            if let Some(gesture) = &self.pinch {
                self.viewport = gesture.update(first, second);
            }
        }

        pub fn pinch_end(&mut self) {
            self.pinch = None;
        }

        // ---- 工具与指针 ----

        #[inline]
        pub fn tool(&self) -> DrawingTool {
            self.tools.tool()
        }

        pub fn set_tool(&mut self, tool: DrawingTool) {
            self.tools.set_tool(tool);
            if tool != DrawingTool::Select {
                self.hover = None;
            }
        }

        #[inline]
        pub fn tools(&self) -> &ToolController {
            &self.tools
        }

        #[inline]
        fn pick_tolerance(&self) -> f64 {
            self.viewport
                .pixels_to_world(self.settings.pick_tolerance_px)
        }

        /// 在世界坐标处拾取实体。图层的关闭标记只作记录，不影响拾取。
        pub fn pick_at(&self, world: Point2) -> Option<EntityId> {
            pick(world, self.drawing.entities(), self.pick_tolerance())
        }

        pub fn pointer_down(&mut self, screen: DVec2, button: PointerButton) {
            let world = self.viewport.screen_to_world(screen);
            self.cursor = Some(world);
            if button == PointerButton::Middle || self.tools.tool() == DrawingTool::Pan {
                self.drag_origin = Some(screen);
                return;
            }
            if button != PointerButton::Primary {
                return;
            }
            self.click_world(world);
        }

        /// 以世界坐标执行一次主键点击（绘制或拾取）。
        pub fn click_world(&mut self, world: Point2) -> Option<EntityId> {
            match self.tools.click(world) {
                ToolClick::Completed(entity) => {
                    let id = self.drawing.add_entity(entity);
                    self.selection.clear();
                    self.selection.insert(id);
                    info!(entity = %id, "新增用户绘制实体");
                    Some(id)
                }
                ToolClick::Anchored(_) => None,
                ToolClick::Ignored => {
                    let picked = self.pick_at(world);
                    self.selection.clear();
                    if let Some(id) = picked {
                        self.selection.insert(id);
                    }
                    picked
                }
            }
        }

        pub fn pointer_move(&mut self, screen: DVec2) {
            if let Some(origin) = self.drag_origin {
                let delta = screen - origin;
                self.viewport.pan_by(delta.x, delta.y);
                self.drag_origin = Some(screen);
            }
            let world = self.viewport.screen_to_world(screen);
            self.cursor = Some(world);
            if self.tools.tool() == DrawingTool::Select && self.drag_origin.is_none() {
                self.hover = self.pick_at(world);
            }
        }

        pub fn pointer_up(&mut self) {
            self.drag_origin = None;
        }

        pub fn pointer_leave(&mut self) {
            self.drag_origin = None;
            self.hover = None;
            self.cursor = None;
        }

        /// Escape：依次关闭说明面板、取消未完成的绘制、清空选中集。
        pub fn key(&mut self, key: Key) -> Dismissed {
            match key {
                Key::Escape => {
                    if self.analysis.dismiss() {
                        Dismissed::Analysis
                    } else if self.tools.cancel() {
                        Dismissed::PendingShape
                    } else if !self.selection.is_empty() {
                        self.clear_selection();
                        Dismissed::Selection
                    } else {
                        Dismissed::Nothing
                    }
                }
            }
        }

        // ---- 分段归类 ----

        #[inline]
        pub fn sectioning(&self) -> &SectioningSession {
            &self.sectioning
        }

        pub fn start_sectioning(&mut self) -> Phase {
            self.tools.set_tool(DrawingTool::Select);
            self.sectioning.start()
        }

        pub fn confirm_section(&mut self) -> Result<Phase, EngineError> {
            self.sectioning
                .confirm(&mut self.drawing, &mut self.selection)
        }

        pub fn answer_section(&mut self, accept: bool) -> Result<Phase, EngineError> {
            self.sectioning
                .answer(accept, &self.drawing, &mut self.selection)
        }

        pub fn section_go_back(&mut self) -> bool {
            let restored = self
                .sectioning
                .go_back(&mut self.drawing, &mut self.selection);
            if restored {
                self.hover = None;
            }
            restored
        }

        pub fn cancel_sectioning(&mut self) {
            self.sectioning.cancel(&mut self.selection);
        }

        // ---- 实体说明 ----

        #[inline]
        pub fn analysis(&self) -> &Analysis {
            &self.analysis
        }

        /// 对单选实体请求文字说明；失败只影响说明面板，图纸与选中集不变。
        pub fn analyze_selection(&mut self, describer: &dyn Describer) -> Result<(), EngineError> {
            let (_, entity) = self
                .single_selection()
                .ok_or(EngineError::NothingToAnalyze)?;
            let entity = entity.clone();
            self.analysis.run(describer, &entity)
        }

        // ---- 渲染 ----

        pub fn render(&self) -> Frame {
            let ghost = self.cursor.and_then(|cursor| self.tools.ghost(cursor));
            render_frame(&RenderInput {
                drawing: &self.drawing,
                viewport: &self.viewport,
                canvas: self.canvas,
                selection: &self.selection,
                hover: self.hover,
                ghost: ghost.as_ref(),
                cursor: self.cursor,
                grid_min_pixels: self.settings.grid_min_pixels,
            })
        }
    }

    impl Default for Scene {
        fn default() -> Self {
            Self::new(CanvasSize::new(1024.0, 768.0), ViewSettings::default())
        }
    }

    #[cfg(test)]
    mod tests {
        use cadvision_core::document::USER_DRAWING_LAYER;

        use super::*;
        use crate::assist::{DescribeError, DescriptionRequest};
        use crate::sectioning::SectionLayer;

        fn scene_with_line() -> (Scene, EntityId) {
            let mut drawing = Drawing::new();
            let id = drawing.add_line(Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0), "A");
            let scene = Scene::with_drawing(
                CanvasSize::new(1200.0, 800.0),
                ViewSettings::default(),
                drawing,
            );
            (scene, id)
        }

        #[test]
        fn clicking_picks_and_background_clears() {
            let (mut scene, id) = scene_with_line();
            // 标准视图：scale = 10，原点在 (600, 400)
            scene.pointer_down(DVec2::new(600.0, 405.0), PointerButton::Primary);
            assert!(scene.is_selected(id));
            scene.pointer_down(DVec2::new(600.0, 500.0), PointerButton::Primary);
            assert_eq!(scene.selection_len(), 0);
        }

        #[test]
        fn hover_follows_pointer_and_clears_on_leave() {
            let (mut scene, id) = scene_with_line();
            scene.pointer_move(DVec2::new(650.0, 398.0));
            assert_eq!(scene.hovered(), Some(id));
            let cursor = scene.cursor_world().unwrap();
            assert!((cursor.x() - 5.0).abs() < 1e-9);
            scene.pointer_leave();
            assert_eq!(scene.hovered(), None);
            assert_eq!(scene.cursor_world(), None);
        }

        #[test]
        fn drawing_tool_adds_entity_and_selects_it() {
            let mut scene = Scene::default();
            scene.set_tool(DrawingTool::Circle);
            let first = scene.click_world(Point2::new(0.0, 0.0));
            assert!(first.is_none());
            let id = scene.click_world(Point2::new(3.0, 4.0)).expect("circle created");
            assert_eq!(scene.selection_len(), 1);
            assert!(scene.is_selected(id));
            assert_eq!(scene.entity(id).unwrap().layer, USER_DRAWING_LAYER);
        }

        #[test]
        fn middle_drag_pans_view() {
            let (mut scene, _) = scene_with_line();
            let before = scene.viewport().offset();
            scene.pointer_down(DVec2::new(100.0, 100.0), PointerButton::Middle);
            scene.pointer_move(DVec2::new(130.0, 90.0));
            scene.pointer_up();
            scene.pointer_move(DVec2::new(500.0, 500.0));
            assert_eq!(scene.viewport().offset(), before + DVec2::new(30.0, -10.0));
        }

        #[test]
        fn zoom_buttons_anchor_at_canvas_center() {
            let (mut scene, _) = scene_with_line();
            let center = scene.canvas().center();
            let world = scene.viewport().screen_to_world(center);
            scene.zoom_in();
            assert!((scene.viewport().scale() - 15.0).abs() < 1e-9);
            scene.zoom_out();
            scene.zoom_out();
            assert!((scene.viewport().scale() - 10.0 / 1.5).abs() < 1e-9);
            let back = scene.viewport().world_to_screen(world);
            assert!((back - center).length() < 1e-9);
            scene.reset_view();
            assert!((scene.viewport().scale() - 10.0).abs() < 1e-12);
        }

        #[test]
        fn resize_keeps_viewport() {
            let (mut scene, _) = scene_with_line();
            scene.pan_by(5.0, 5.0);
            let before = scene.viewport();
            scene.resize(CanvasSize::new(300.0, 200.0));
            assert_eq!(scene.viewport(), before);
        }

        #[test]
        fn escape_unwinds_one_layer_at_a_time() {
            let (mut scene, id) = scene_with_line();
            scene.select(id).unwrap();
            scene.set_tool(DrawingTool::Line);
            scene.click_world(Point2::new(0.0, 5.0));
            assert_eq!(scene.key(Key::Escape), Dismissed::PendingShape);
            assert_eq!(scene.key(Key::Escape), Dismissed::Selection);
            assert_eq!(scene.key(Key::Escape), Dismissed::Nothing);
        }

        #[test]
        fn sectioning_through_scene() {
            let (mut scene, id) = scene_with_line();
            assert_eq!(
                scene.start_sectioning(),
                Phase::Classify(SectionLayer::RoadEdge)
            );
            assert!(matches!(
                scene.confirm_section(),
                Err(EngineError::EmptySelection { .. })
            ));
            scene.select(id).unwrap();
            scene.confirm_section().unwrap();
            assert_eq!(scene.entity(id).unwrap().layer, "RoadEdge");
            assert!(scene.section_go_back());
            assert_eq!(scene.entity(id).unwrap().layer, "A");
            assert!(scene.is_selected(id));
        }

        #[test]
        fn drawing_after_go_back_gets_a_fresh_id() {
            let (mut scene, id) = scene_with_line();
            scene.start_sectioning();
            scene.select(id).unwrap();
            scene.confirm_section().unwrap();

            scene.set_tool(DrawingTool::Line);
            scene.click_world(Point2::new(0.0, 20.0));
            let drawn = scene.click_world(Point2::new(5.0, 20.0)).expect("line drawn");
            assert!(scene.section_go_back());
            assert!(scene.entity(drawn).is_none());

            scene.click_world(Point2::new(0.0, 30.0));
            let again = scene.click_world(Point2::new(5.0, 30.0)).expect("line drawn");
            assert_ne!(again, drawn);
            assert_ne!(again, id);
        }

        #[test]
        fn entities_on_switched_off_layers_can_be_picked() {
            let mut drawing = Drawing::new();
            drawing.ensure_layer("Off").is_visible = false;
            let id = drawing.add_line(Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0), "Off");
            let scene = Scene::with_drawing(
                CanvasSize::new(1200.0, 800.0),
                ViewSettings::default(),
                drawing,
            );
            assert_eq!(scene.pick_at(Point2::new(0.0, 0.0)), Some(id));
        }

        #[test]
        fn loading_replaces_drawing_and_resets_state() {
            let (mut scene, id) = scene_with_line();
            scene.select(id).unwrap();
            scene.start_sectioning();
            scene.clear();
            assert!(scene.drawing().is_empty());
            assert_eq!(scene.drawing().layer_names(), vec![USER_DRAWING_LAYER]);
            assert_eq!(scene.selection_len(), 0);
            assert!(!scene.sectioning().is_active());
            assert!(matches!(
                scene.select(id),
                Err(EngineError::EntityNotFound(_))
            ));
        }

        struct Rejecting;

        impl Describer for Rejecting {
            fn describe(&self, _request: &DescriptionRequest) -> Result<String, DescribeError> {
                Err(DescribeError::Unavailable)
            }
        }

        #[test]
        fn analysis_requires_single_selection_and_keeps_state() {
            let (mut scene, id) = scene_with_line();
            assert!(matches!(
                scene.analyze_selection(&Rejecting),
                Err(EngineError::NothingToAnalyze)
            ));
            scene.select(id).unwrap();
            let before = scene.drawing().clone();
            scene.analyze_selection(&Rejecting).unwrap();
            assert!(scene.analysis().message().is_some());
            assert_eq!(scene.drawing(), &before);
            assert!(scene.is_selected(id));
            assert_eq!(scene.key(Key::Escape), Dismissed::Analysis);
        }

        #[test]
        fn render_reports_status_and_ghost() {
            let mut scene = Scene::default();
            scene.set_tool(DrawingTool::Line);
            scene.click_world(Point2::new(0.0, 0.0));
            scene.pointer_move(DVec2::new(600.0, 300.0));
            let frame = scene.render();
            assert_eq!(frame.items.len(), 1);
            assert!(frame.status.cursor.is_some());
            assert!(frame.status.scale > 0.0);
        }
    }
}

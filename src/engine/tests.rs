use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use strum::VariantNames;

use super::*;
use crate::layout_engine::ItemSize;
use crate::model::emitter::{Migration, SortAction};
use crate::model::item::{DragPhase, SortData, SortValue, VisibilityState};
use crate::sys::geometry::{Point, Rect};
use crate::sys::host::{HeadlessHost, ItemFlag};

const GRID_A: ElementId = ElementId(100);
const GRID_B: ElementId = ElementId(200);
const DRAG_LAYER: ElementId = ElementId(900);

type Log = Rc<RefCell<Vec<GridEvent>>>;
type Calls = Rc<RefCell<Vec<(&'static str, Vec<ItemId>)>>>;

fn host() -> HeadlessHost {
    let mut host = HeadlessHost::new();
    host.set_container_rect(GRID_A, Rect::new(0.0, 0.0, 200.0, 400.0));
    host.set_container_rect(GRID_B, Rect::new(300.0, 0.0, 200.0, 400.0));
    host.set_container_rect(DRAG_LAYER, Rect::new(10.0, 20.0, 1000.0, 1000.0));
    for element in 1..=10 {
        host.set_metrics(ElementId(element), ItemSize::new(100.0, 100.0));
    }
    host
}

fn engine() -> Engine<HeadlessHost> { Engine::new(host(), Config::default()).unwrap() }

fn elements(ids: &[u64]) -> Vec<ElementId> { ids.iter().copied().map(ElementId).collect() }

/// Grid A holding elements 1, 2 and 3 at (0, 0), (100, 0) and (0, 100).
fn three_items(settings: GridSettings) -> (Engine<HeadlessHost>, GridId, Vec<ItemId>) {
    let mut engine = engine();
    let grid = engine.add_grid(GRID_A, settings).unwrap();
    let items = engine.add_items(grid, &elements(&[1, 2, 3]), -1, true).unwrap();
    (engine, grid, items)
}

fn defaults() -> GridSettings { GridSettings::from(&Config::default()) }

fn draggable() -> GridSettings {
    let mut settings = defaults();
    settings.drag.enabled = true;
    settings.drag_sort_heuristics.sort_interval = 0.0;
    settings.drag_sort_heuristics.min_drag_distance = 0.0;
    settings
}

fn record(engine: &Engine<HeadlessHost>) -> Log {
    let log = Log::default();
    for name in EventKind::VARIANTS {
        let Ok(kind) = EventKind::from_str(name) else {
            continue;
        };
        let log = log.clone();
        engine.on(kind, move |event| log.borrow_mut().push(event.clone()));
    }
    log
}

fn names(log: &Log) -> Vec<&'static str> { log.borrow().iter().map(GridEvent::name).collect() }

fn tagged(calls: &Calls, tag: &'static str) -> Option<BatchCallback> {
    let calls = calls.clone();
    Some(Box::new(move |items| calls.borrow_mut().push((tag, items))))
}

fn translate(engine: &Engine<HeadlessHost>, element: u64) -> Point {
    engine.host().translate(ElementId(element)).unwrap()
}

mod layout {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn added_items_jump_to_their_slots() {
        let mut engine = engine();
        let log = record(&engine);
        let grid = engine.add_grid(GRID_A, engine.grid_settings()).unwrap();
        let items = engine.add_items(grid, &elements(&[1, 2, 3]), -1, true).unwrap();

        assert_eq!(names(&log), vec!["add", "layoutStart", "layoutEnd"]);
        assert_eq!(engine.grid(grid).unwrap().items(), items.as_slice());
        assert_eq!(translate(&engine, 1), Point::new(0.0, 0.0));
        assert_eq!(translate(&engine, 2), Point::new(100.0, 0.0));
        assert_eq!(translate(&engine, 3), Point::new(0.0, 100.0));
        assert_eq!(engine.host().parent(ElementId(2)), Some(GRID_A));
        assert_eq!(engine.item_for_element(ElementId(3)), Some(items[2]));
        assert!(engine.is_idle());
    }

    #[test]
    fn insert_index_counts_from_the_end() {
        let (mut engine, grid, items) = three_items(defaults());
        let added = engine.add_items(grid, &elements(&[4]), -2, false).unwrap();
        assert_eq!(engine.grid(grid).unwrap().items(), &[items[0], items[1], added[0], items[2]]);
    }

    #[test]
    fn superseded_layout_is_aborted_and_interrupted() {
        let (mut engine, grid, items) = three_items(defaults());
        let (a, b, c) = (items[0], items[1], items[2]);
        let log = record(&engine);

        assert!(engine.move_item(grid, Position::Index(0), Position::Index(2), SortAction::Move, false).unwrap());
        assert_eq!(engine.grid(grid).unwrap().items(), &[b, c, a]);

        let outcome = Rc::new(RefCell::new(Vec::new()));
        let first = outcome.clone();
        engine
            .layout(
                grid,
                false,
                Some(Box::new(move |items: &[ItemId], interrupted: bool| {
                    first.borrow_mut().push((items.to_vec(), interrupted))
                })),
            )
            .unwrap();
        assert_eq!(engine.tick(150.0), 6);
        assert_eq!(translate(&engine, 2), Point::new(50.0, 0.0));
        assert!(engine.host().element(ElementId(2)).unwrap().has_flag(ItemFlag::Positioning));

        let second = outcome.clone();
        engine
            .layout(
                grid,
                false,
                Some(Box::new(move |items: &[ItemId], interrupted: bool| {
                    second.borrow_mut().push((items.to_vec(), interrupted))
                })),
            )
            .unwrap();
        assert_eq!(*outcome.borrow(), vec![(vec![b, c, a], true)]);

        engine.settle(150.0, 50.0, 20);
        assert_eq!(*outcome.borrow(), vec![(vec![b, c, a], true), (vec![b, c, a], false)]);
        assert_eq!(names(&log), vec!["move", "layoutStart", "layoutAbort", "layoutStart", "layoutEnd"]);
        assert_eq!(translate(&engine, 1), Point::new(0.0, 100.0));
        assert_eq!(translate(&engine, 2), Point::new(0.0, 0.0));
        assert!(!engine.host().element(ElementId(2)).unwrap().has_flag(ItemFlag::Positioning));
        assert!(engine.is_idle());
    }

    #[test]
    fn worker_results_for_superseded_layouts_are_dropped() {
        let mut config = Config::default();
        config.layout.workers = 1;
        config.layout.worker_threshold = 1;
        let mut engine = Engine::new(host(), config).unwrap();
        let grid = engine.add_grid(GRID_A, engine.grid_settings()).unwrap();
        let items = engine.add_items(grid, &elements(&[1, 2, 3]), -1, false).unwrap();
        let log = record(&engine);

        let outcome = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..2 {
            let sink = outcome.clone();
            engine
                .layout(
                    grid,
                    false,
                    Some(Box::new(move |items: &[ItemId], interrupted: bool| {
                        sink.borrow_mut().push((items.to_vec(), interrupted))
                    })),
                )
                .unwrap();
        }
        assert_eq!(*outcome.borrow(), vec![(items.clone(), true)]);
        assert!(engine.grid(grid).unwrap().has_pending_layout());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let mut now = 0.0;
        while engine.grid(grid).unwrap().has_pending_layout() && std::time::Instant::now() < deadline {
            now += 16.0;
            engine.tick(now);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(*outcome.borrow(), vec![(items.clone(), true), (items, false)]);
        assert_eq!(names(&log), vec!["layoutStart", "layoutEnd"]);
        assert_eq!(translate(&engine, 3), Point::new(0.0, 100.0));
    }

    #[test]
    fn destroying_a_grid_settles_batches_waiting_on_the_worker() {
        let mut config = Config::default();
        config.layout.workers = 1;
        config.layout.worker_threshold = 1;
        let mut engine = Engine::new(host(), config).unwrap();
        let grid = engine.add_grid(GRID_A, engine.grid_settings()).unwrap();
        let items = engine.add_items(grid, &elements(&[1, 2, 3]), -1, false).unwrap();

        let calls = Calls::default();
        engine.hide(grid, &[items[0]], false, tagged(&calls, "hide")).unwrap();
        assert!(engine.grid(grid).unwrap().has_pending_layout());
        assert!(calls.borrow().is_empty());

        engine.destroy_grid(grid, false).unwrap();
        assert_eq!(*calls.borrow(), vec![("hide", vec![])]);
    }
}

mod visibility {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn show_on_visible_item_completes_at_once() {
        let (mut engine, grid, items) = three_items(defaults());
        let log = record(&engine);
        engine.host_mut().take_writes();

        let calls = Calls::default();
        engine.show(grid, &[items[0]], false, tagged(&calls, "show")).unwrap();

        assert_eq!(*calls.borrow(), vec![("show", vec![items[0]])]);
        assert!(log.borrow().is_empty());
        assert!(engine.host().writes().is_empty());
        assert!(engine.is_idle());
    }

    #[test]
    fn hide_interrupts_running_show() {
        let (mut engine, grid, items) = three_items(defaults());
        let a = items[0];
        engine.hide(grid, &[a], true, None).unwrap();
        assert_eq!(engine.item(a).unwrap().visibility.state(), VisibilityState::Hidden);
        assert!(!engine.host().element(ElementId(1)).unwrap().displayed);

        let calls = Calls::default();
        engine.show(grid, &[a], false, tagged(&calls, "show")).unwrap();
        assert!(engine.host().element(ElementId(1)).unwrap().displayed);
        engine.hide(grid, &[a], false, tagged(&calls, "hide")).unwrap();
        assert_eq!(*calls.borrow(), vec![("show", vec![])]);

        engine.settle(0.0, 16.0, 100);
        assert_eq!(*calls.borrow(), vec![("show", vec![]), ("hide", vec![a])]);
        let item = engine.item(a).unwrap();
        assert_eq!(item.visibility.state(), VisibilityState::Hidden);
        assert!(!item.active);
        let element = engine.host().element(ElementId(1)).unwrap();
        assert!(!element.displayed);
        assert!(element.has_flag(ItemFlag::Hidden));
        assert_eq!(element.visibility, 0.0);
    }

    #[test]
    fn callbacks_follow_completion_order() {
        let (mut engine, grid, items) = three_items(defaults());
        let (a, b) = (items[0], items[1]);
        let calls = Calls::default();

        engine.hide(grid, &[a], false, tagged(&calls, "a1")).unwrap();
        engine.hide(grid, &[b], false, tagged(&calls, "b")).unwrap();
        engine.hide(grid, &[a], true, tagged(&calls, "a2")).unwrap();
        assert_eq!(*calls.borrow(), vec![("a1", vec![a]), ("a2", vec![a])]);

        engine.settle(0.0, 16.0, 100);
        assert_eq!(*calls.borrow(), vec![("a1", vec![a]), ("a2", vec![a]), ("b", vec![b])]);
    }

    #[test]
    fn show_and_hide_announce_only_changes() {
        let (mut engine, grid, items) = three_items(defaults());
        let log = record(&engine);

        engine.hide(grid, &[items[1]], true, None).unwrap();
        assert_eq!(names(&log), vec!["layoutStart", "hideStart", "hideEnd"]);
        log.borrow_mut().clear();

        engine.hide(grid, &[items[1]], true, None).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn filter_hides_non_matches_and_lays_out_once() {
        let (mut engine, grid, items) = three_items(defaults());
        let log = record(&engine);

        engine.filter(grid, |item| item.element != ElementId(2), true).unwrap();

        assert_eq!(names(&log), vec!["hideStart", "hideEnd", "filter", "layoutStart", "layoutEnd"]);
        assert_eq!(log.borrow()[2], GridEvent::Filter {
            grid,
            shown: vec![],
            hidden: vec![items[1]],
        });
        assert_eq!(translate(&engine, 3), Point::new(100.0, 0.0));
        assert!(!engine.host().element(ElementId(2)).unwrap().displayed);

        log.borrow_mut().clear();
        engine.filter(grid, |item| item.element != ElementId(2), true).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn items_of_another_grid_are_rejected() {
        let (mut engine, _, items) = three_items(defaults());
        let other = engine.add_grid(GRID_B, defaults()).unwrap();
        let result = engine.show(other, &[items[0]], false, None);
        assert!(matches!(result, Err(EngineError::ForeignItem { .. })));
    }
}

mod collection {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn ranked() -> GridSettings {
        let mut settings = defaults();
        settings.sort_data = Some(Rc::new(|element: ElementId| {
            SortData::from([("rank".to_string(), SortValue::from(-(element.0 as f64)))])
        }));
        settings
    }

    #[test]
    fn sort_by_keys_uses_extracted_data() {
        let (mut engine, grid, items) = three_items(ranked());
        let log = record(&engine);
        let (a, b, c) = (items[0], items[1], items[2]);

        engine.sort(grid, SortBy::Keys(vec![SortKey::asc("rank")]), false, false).unwrap();
        assert_eq!(engine.grid(grid).unwrap().items(), &[c, b, a]);
        assert_eq!(log.borrow()[0], GridEvent::Sort {
            grid,
            items: vec![c, b, a],
            previous: vec![a, b, c],
        });

        engine.sort(grid, SortBy::Keys(vec![SortKey::desc("rank")]), false, false).unwrap();
        assert_eq!(engine.grid(grid).unwrap().items(), &[a, b, c]);

        engine
            .sort(grid, SortBy::Comparator(Box::new(|x: &Item, y: &Item| x.element.cmp(&y.element))), true, true)
            .unwrap();
        assert_eq!(engine.grid(grid).unwrap().items(), &[c, b, a]);
    }

    #[test]
    fn sort_order_must_be_a_permutation() {
        let (mut engine, grid, items) = three_items(defaults());
        let result = engine.sort(grid, SortBy::Order(vec![items[0], items[1]]), false, false);
        assert!(matches!(result, Err(EngineError::InvalidSortOrder)));
        assert_eq!(engine.grid(grid).unwrap().items(), items.as_slice());

        let reversed: Vec<_> = items.iter().rev().copied().collect();
        engine.sort(grid, SortBy::Order(reversed.clone()), false, false).unwrap();
        assert_eq!(engine.grid(grid).unwrap().items(), reversed.as_slice());
    }

    #[test]
    fn swap_exchanges_two_items() {
        let (mut engine, grid, items) = three_items(defaults());
        let moved = engine.move_item(grid, items[0].into(), items[2].into(), SortAction::Swap, false).unwrap();
        assert!(moved);
        assert_eq!(engine.grid(grid).unwrap().items(), &[items[2], items[1], items[0]]);
        assert!(!engine.move_item(grid, Position::Index(1), Position::Index(1), SortAction::Move, false).unwrap());
    }

    #[test]
    fn remove_items_reports_indices_and_releases_elements() {
        let (mut engine, grid, items) = three_items(defaults());
        let log = record(&engine);

        let indices = engine.remove_items(grid, &[items[1]], false, true).unwrap();

        assert_eq!(indices, vec![1]);
        assert_eq!(names(&log)[0], "remove");
        assert_eq!(engine.grid(grid).unwrap().items(), &[items[0], items[2]]);
        assert!(matches!(engine.item(items[1]), Err(EngineError::UnknownItem(_))));
        assert_eq!(engine.item_for_element(ElementId(2)), None);
        assert!(!engine.host().element(ElementId(2)).unwrap().removed);

        // The element is free to join again.
        engine.add_items(grid, &elements(&[2]), -1, false).unwrap();
    }

    #[test]
    fn elements_belong_to_one_item() {
        let (mut engine, grid, items) = three_items(defaults());
        let owned = engine.add_items(grid, &elements(&[1]), -1, false);
        assert!(matches!(owned, Err(EngineError::ElementOwned { item, .. }) if item == items[0]));
        let twice = engine.add_items(grid, &elements(&[4, 4]), -1, false);
        assert!(matches!(twice, Err(EngineError::DuplicateElement(ElementId(4)))));
        assert_eq!(engine.grid(grid).unwrap().items().len(), 3);
    }

    #[test]
    fn a_container_hosts_one_grid() {
        let (mut engine, ..) = three_items(defaults());
        assert!(matches!(engine.add_grid(GRID_A, defaults()), Err(EngineError::InvalidContainer(GRID_A))));
    }

    #[test]
    fn destroyed_grids_reject_calls() {
        let (mut engine, grid, items) = three_items(defaults());
        let log = record(&engine);

        engine.destroy_grid(grid, true).unwrap();

        assert_eq!(names(&log), vec!["destroy"]);
        assert!(matches!(engine.grid(grid), Err(EngineError::DestroyedGrid(_))));
        assert!(matches!(engine.layout(grid, false, None), Err(EngineError::DestroyedGrid(_))));
        assert!(matches!(engine.item(items[0]), Err(EngineError::UnknownItem(_))));
        assert!(engine.host().element(ElementId(1)).unwrap().removed);
        assert!(engine.is_idle());
    }
}

mod migration {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn two_grids(settings: GridSettings) -> (Engine<HeadlessHost>, GridId, GridId, Vec<ItemId>) {
        let (mut engine, a, mut items) = three_items(settings.clone());
        let b = engine.add_grid(GRID_B, settings).unwrap();
        items.extend(engine.add_items(b, &elements(&[4]), -1, true).unwrap());
        (engine, a, b, items)
    }

    #[test]
    fn send_moves_the_item_between_grids() {
        let (mut engine, from, to, items) = two_grids(defaults());
        let log = record(&engine);
        let a = items[0];

        assert!(engine.send(a, to, Position::Index(0), SendOptions::default()).unwrap());

        assert_eq!(&names(&log)[..4], &["beforeSend", "beforeReceive", "send", "receive"]);
        assert_eq!(log.borrow()[2], GridEvent::Send(Migration {
            item: a,
            from_grid: from,
            from_index: 0,
            to_grid: to,
            to_index: 0,
        }));
        assert_eq!(engine.grid(from).unwrap().items(), &[items[1], items[2]]);
        assert_eq!(engine.grid(to).unwrap().items(), &[a, items[3]]);
        assert_eq!(engine.item(a).unwrap().grid, to);
        assert_eq!(engine.host().parent(ElementId(1)), Some(GRID_B));
        // Rebased into the new container without moving on screen.
        assert_eq!(translate(&engine, 1), Point::new(-300.0, 0.0));
        assert!(engine.item(a).unwrap().migrate.is_active());

        engine.settle(0.0, 16.0, 100);
        assert_eq!(translate(&engine, 1), Point::new(0.0, 0.0));
        assert_eq!(translate(&engine, 4), Point::new(100.0, 0.0));
        assert!(!engine.item(a).unwrap().migrate.is_active());
        assert!(!engine.send(a, to, Position::Index(0), SendOptions::default()).unwrap());
    }

    #[test]
    fn send_through_another_container_returns_to_the_grid() {
        let (mut engine, _, to, items) = two_grids(defaults());
        let options = SendOptions {
            append_to: Some(DRAG_LAYER),
            ..SendOptions::default()
        };
        engine.send(items[1], to, Position::Index(-1), options).unwrap();
        assert_eq!(engine.host().parent(ElementId(2)), Some(DRAG_LAYER));
        assert_eq!(translate(&engine, 2), Point::new(90.0, -20.0));

        engine.settle(0.0, 16.0, 100);
        assert_eq!(engine.host().parent(ElementId(2)), Some(GRID_B));
        assert_eq!(translate(&engine, 2), Point::new(100.0, 0.0));
    }

    #[test]
    fn dragging_across_grids_migrates_the_item() {
        let (mut engine, from, to, items) = two_grids(draggable());
        engine.connect_drag_sort(from, &[to]).unwrap();
        let log = record(&engine);
        let a = items[0];

        assert!(engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap());
        engine.pointer_move(Point::new(350.0, 50.0), 10.0);

        assert_eq!(engine.grid(from).unwrap().items(), &[items[1], items[2]]);
        assert_eq!(engine.grid(to).unwrap().items(), &[a, items[3]]);
        assert_eq!(engine.host().parent(ElementId(1)), Some(GRID_B));
        assert_eq!(translate(&engine, 1), Point::new(0.0, 0.0));

        engine.pointer_up(20.0);
        assert_eq!(names(&log), vec![
            "dragInit",
            "dragStart",
            "beforeSend",
            "beforeReceive",
            "send",
            "receive",
            "layoutStart",
            "layoutStart",
            "dragMove",
            "dragEnd",
            "dragReleaseStart",
            "dragReleaseEnd",
        ]);
        assert_eq!(log.borrow()[4], GridEvent::Send(Migration {
            item: a,
            from_grid: from,
            from_index: 0,
            to_grid: to,
            to_index: 0,
        }));
        assert_eq!(engine.item(a).unwrap().sort_data, None);
        assert_eq!(engine.dragged_item(), None);
    }

    #[test]
    fn swap_migration_sends_the_target_back() {
        let mut settings = draggable();
        settings.drag_sort.migrate_action = SortAction::Swap;
        let (mut engine, from, to, items) = two_grids(settings);
        engine.connect_drag_sort(from, &[to]).unwrap();
        let (a, d) = (items[0], items[3]);

        engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(350.0, 50.0), 10.0);

        assert_eq!(engine.grid(to).unwrap().items(), &[a]);
        assert_eq!(engine.grid(from).unwrap().items(), &[d, items[1], items[2]]);
        assert_eq!(engine.host().parent(ElementId(4)), Some(GRID_A));
        assert_eq!(translate(&engine, 4), Point::new(300.0, 0.0));

        engine.pointer_up(20.0);
        engine.settle(20.0, 16.0, 100);
        assert_eq!(translate(&engine, 4), Point::new(0.0, 0.0));
        assert!(!engine.item(d).unwrap().migrate.is_active());
    }

    #[test]
    fn unconnected_grids_are_not_targets() {
        let (mut engine, from, to, items) = two_grids(draggable());
        engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(350.0, 50.0), 10.0);
        engine.pointer_up(20.0);
        assert_eq!(engine.grid(from).unwrap().items().len(), 3);
        assert_eq!(engine.grid(to).unwrap().items(), &[items[3]]);
    }
}

mod drag {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn dragging_over_a_neighbour_moves_the_item() {
        let (mut engine, grid, items) = three_items(draggable());
        let log = record(&engine);
        let (a, b, c) = (items[0], items[1], items[2]);

        assert!(engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap());
        assert_eq!(engine.dragged_item(), Some(a));
        assert!(engine.host().element(ElementId(1)).unwrap().has_flag(ItemFlag::Dragging));

        engine.pointer_move(Point::new(150.0, 50.0), 10.0);
        assert_eq!(translate(&engine, 1), Point::new(100.0, 0.0));
        assert_eq!(engine.grid(grid).unwrap().items(), &[b, a, c]);

        engine.pointer_up(20.0);
        assert_eq!(names(&log), vec![
            "dragInit",
            "dragStart",
            "move",
            "layoutStart",
            "dragMove",
            "dragEnd",
            "dragReleaseStart",
            "dragReleaseEnd",
        ]);
        assert_eq!(log.borrow()[2], GridEvent::Move {
            grid,
            item: a,
            from_index: 0,
            to_index: 1,
            action: SortAction::Move,
        });
        let element = engine.host().element(ElementId(1)).unwrap();
        assert!(!element.has_flag(ItemFlag::Dragging));
        assert!(!element.has_flag(ItemFlag::Releasing));
    }

    #[test]
    fn drop_runs_the_owed_evaluation() {
        let mut settings = draggable();
        settings.drag_sort_heuristics.sort_interval = 1000.0;
        let (mut engine, grid, items) = three_items(settings);
        let (a, b, c) = (items[0], items[1], items[2]);

        engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(150.0, 50.0), 10.0);
        assert_eq!(engine.grid(grid).unwrap().items(), &[b, a, c]);
        engine.pointer_move(Point::new(50.0, 50.0), 20.0);
        assert_eq!(engine.grid(grid).unwrap().items(), &[b, a, c]);

        engine.pointer_up(30.0);
        assert_eq!(engine.grid(grid).unwrap().items(), &[a, b, c]);
    }

    #[test]
    fn cancel_skips_the_owed_evaluation() {
        let mut settings = draggable();
        settings.drag_sort_heuristics.sort_interval = 1000.0;
        let (mut engine, grid, items) = three_items(settings);
        let (a, b, c) = (items[0], items[1], items[2]);

        engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(150.0, 50.0), 10.0);
        engine.pointer_move(Point::new(50.0, 50.0), 20.0);
        engine.pointer_cancel(30.0);

        assert_eq!(engine.grid(grid).unwrap().items(), &[b, a, c]);
        assert_eq!(engine.dragged_item(), None);
        assert!(engine.item(a).unwrap().is_releasing());
    }

    #[test]
    fn tick_fires_the_trailing_evaluation() {
        let mut settings = draggable();
        settings.drag_sort_heuristics.sort_interval = 100.0;
        let (mut engine, grid, items) = three_items(settings);
        let (a, b, c) = (items[0], items[1], items[2]);

        engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(150.0, 50.0), 10.0);
        engine.pointer_move(Point::new(50.0, 50.0), 20.0);
        engine.tick(50.0);
        assert_eq!(engine.grid(grid).unwrap().items(), &[b, a, c]);
        engine.tick(120.0);
        assert_eq!(engine.grid(grid).unwrap().items(), &[a, b, c]);
    }

    #[test]
    fn new_drag_aborts_the_release() {
        let mut settings = draggable();
        settings.drag_sort.enabled = false;
        let (mut engine, _, items) = three_items(settings);
        let a = items[0];

        engine.pointer_down(a, Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_move(Point::new(80.0, 50.0), 10.0);
        engine.pointer_up(20.0);
        assert!(engine.item(a).unwrap().is_releasing());
        engine.tick(100.0);
        assert_ne!(translate(&engine, 1), Point::new(30.0, 0.0));

        let log = record(&engine);
        assert!(engine.pointer_down(a, Point::new(50.0, 50.0), 120.0).unwrap());
        assert_eq!(names(&log), vec!["dragReleaseEnd", "dragInit", "dragStart"]);
        assert_eq!(translate(&engine, 1), Point::new(0.0, 0.0));
        let element = engine.host().element(ElementId(1)).unwrap();
        assert!(element.has_flag(ItemFlag::Dragging));
        assert!(!element.has_flag(ItemFlag::Releasing));
        assert!(!element.has_flag(ItemFlag::Positioning));
    }

    #[test]
    fn drag_container_hosts_the_element_until_release_ends() {
        let mut settings = draggable();
        settings.drag_sort.enabled = false;
        settings.drag_container = Some(DRAG_LAYER);
        let (mut engine, _, items) = three_items(settings);

        engine.pointer_down(items[1], Point::new(150.0, 50.0), 0.0).unwrap();
        assert_eq!(engine.host().parent(ElementId(2)), Some(DRAG_LAYER));
        assert_eq!(translate(&engine, 2), Point::new(90.0, -20.0));

        engine.pointer_up(10.0);
        assert_eq!(engine.host().parent(ElementId(2)), Some(GRID_A));
        assert_eq!(translate(&engine, 2), Point::new(100.0, 0.0));
        assert_eq!(engine.item(items[1]).unwrap().drag, DragPhase::Idle);
    }

    #[test]
    fn start_waits_for_distance() {
        let mut settings = draggable();
        settings.drag.start_distance = 10.0;
        let (mut engine, _, items) = three_items(settings);

        assert!(engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap());
        engine.pointer_move(Point::new(55.0, 50.0), 5.0);
        assert_eq!(engine.dragged_item(), None);
        engine.pointer_move(Point::new(65.0, 50.0), 10.0);
        assert_eq!(engine.dragged_item(), Some(items[0]));
        assert_eq!(translate(&engine, 1), Point::new(15.0, 0.0));
    }

    #[test]
    fn start_waits_for_delay() {
        let mut settings = draggable();
        settings.drag.start_delay = 100.0;
        let (mut engine, _, items) = three_items(settings);

        engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap();
        engine.tick(50.0);
        assert_eq!(engine.dragged_item(), None);
        engine.tick(120.0);
        assert_eq!(engine.dragged_item(), Some(items[0]));
    }

    #[test]
    fn early_release_never_starts_a_drag() {
        let mut settings = draggable();
        settings.drag.start_delay = 100.0;
        let (mut engine, _, items) = three_items(settings);
        let log = record(&engine);

        engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap();
        engine.pointer_up(50.0);
        engine.tick(200.0);
        assert!(log.borrow().is_empty());
        assert!(engine.is_idle());
    }

    #[test]
    fn disabled_grids_ignore_presses() {
        let (mut engine, _, items) = three_items(defaults());
        assert!(!engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap());
        assert_eq!(engine.dragged_item(), None);
    }

    #[test]
    fn sending_the_dragged_item_ends_the_drag_silently() {
        let (mut engine, _, items) = three_items(draggable());
        let other = engine.add_grid(GRID_B, draggable()).unwrap();
        engine.pointer_down(items[0], Point::new(50.0, 50.0), 0.0).unwrap();
        let log = record(&engine);

        engine.send(items[0], other, Position::Index(-1), SendOptions::default()).unwrap();

        assert!(!names(&log).contains(&"dragEnd"));
        assert_eq!(engine.dragged_item(), None);
        assert!(!engine.host().element(ElementId(1)).unwrap().has_flag(ItemFlag::Dragging));
    }
}

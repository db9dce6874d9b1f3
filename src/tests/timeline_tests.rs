//! Timeline model tests: upsert, missing groups, stale updates, reducer

use crate::timeline::lines;
use crate::timeline::{
    GroupPatch, LineStatus, PendingUpdate, Timeline, TimelineAction, TimelineGroup, TimelineItem,
};

fn timeline_with(group_id: &str) -> Timeline {
    let mut timeline = Timeline::new();
    timeline.add_group(TimelineGroup::new(group_id, "Mint NFT"));
    timeline
}

#[test]
fn test_update_item_upserts_by_line_id() {
    let mut timeline = timeline_with("g1");

    assert!(timeline.update_item("g1", TimelineItem::waiting(lines::TX_SENT, "sending")));
    assert!(timeline.update_item("g1", TimelineItem::waiting(lines::TX_INCLUDED, "waiting")));
    assert!(timeline.update_item("g1", TimelineItem::success(lines::TX_SENT, "sent")));

    let group = timeline.group("g1").unwrap();
    assert_eq!(group.lines.len(), 2);
    // The existing line keeps its position
    assert_eq!(
        group.line_ids().collect::<Vec<_>>(),
        vec![lines::TX_SENT, lines::TX_INCLUDED]
    );
    assert_eq!(group.line(lines::TX_SENT).unwrap().status, LineStatus::Success);
    assert_eq!(group.line(lines::TX_SENT).unwrap().content, "sent");
}

#[test]
fn test_repeated_identical_update_is_idempotent() {
    let mut timeline = timeline_with("g1");
    let item = TimelineItem::success(lines::TX_PREPARED, "prepared");

    timeline.update_item("g1", item.clone());
    let once = timeline.clone();
    timeline.update_item("g1", item);

    assert_eq!(timeline, once);
}

#[test]
fn test_missing_group_is_a_noop() {
    let mut timeline = timeline_with("g1");
    let before = timeline.clone();

    assert!(!timeline.update_item("gone", TimelineItem::error(lines::TX_SENT, "boom")));
    assert!(!timeline.update_group("gone", GroupPatch::status(LineStatus::Error)));
    assert!(timeline.delete_group("gone").is_none());

    assert_eq!(timeline, before);
}

#[test]
fn test_stale_update_does_not_overwrite_newer_error() {
    let mut timeline = timeline_with("g1");
    let stale = TimelineItem::waiting(lines::TX_SENT, "retrying");
    let newer = TimelineItem::error(lines::TX_SENT, "timed out");

    timeline.update_item("g1", newer);
    assert!(!timeline.update_item("g1", stale));

    let line = timeline.group("g1").unwrap().line(lines::TX_SENT).unwrap().clone();
    assert_eq!(line.status, LineStatus::Error);
    assert_eq!(line.content, "timed out");

    // An explicit newer event may replace the error
    timeline.update_item("g1", TimelineItem::success(lines::TX_SENT, "sent"));
    assert_eq!(
        timeline.group("g1").unwrap().line(lines::TX_SENT).unwrap().status,
        LineStatus::Success
    );
}

#[test]
fn test_group_status_only_changes_when_set() {
    let mut timeline = Timeline::new();
    timeline.add_group(TimelineGroup::new("g1", "Mint").with_required([lines::TX_PREPARED]));
    timeline.update_item("g1", TimelineItem::success(lines::TX_PREPARED, "prepared"));

    let group = timeline.group("g1").unwrap();
    assert!(group.required_satisfied());
    assert_eq!(group.status, LineStatus::Waiting);

    timeline.update_group("g1", GroupPatch::status(LineStatus::Success));
    assert_eq!(timeline.group("g1").unwrap().status, LineStatus::Success);
}

#[test]
fn test_required_for_success() {
    let mut group = TimelineGroup::new("g1", "Mint");
    // No requirements is never satisfied
    assert!(!group.required_satisfied());

    group = group.with_required([lines::TX_PROVED, lines::MINTED]);
    group.lines.push(TimelineItem::success(lines::TX_PROVED, "proved"));
    assert!(!group.required_satisfied());

    group.lines.push(TimelineItem::waiting(lines::MINTED, "processing"));
    assert!(!group.required_satisfied());

    group.lines.pop();
    group.lines.push(TimelineItem::success(lines::MINTED, "processed"));
    assert!(group.required_satisfied());
    assert!(!group.has_error_line());
}

#[test]
fn test_add_group_replaces_in_place() {
    let mut timeline = Timeline::new();
    timeline.add_group(TimelineGroup::new("a", "A"));
    timeline.add_group(TimelineGroup::new("b", "B"));
    timeline.add_group(TimelineGroup::new("a", "A again"));

    let ids: Vec<_> = timeline.groups().iter().map(|g| g.group_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(timeline.group("a").unwrap().title, "A again");
}

#[test]
fn test_reducer_replays_actions() {
    let actions = vec![
        TimelineAction::AddGroup(TimelineGroup::new("g1", "Transfer")),
        TimelineAction::UpdateItem(PendingUpdate::new(
            "g1",
            TimelineItem::success(lines::TX_PREPARED, "prepared"),
        )),
        TimelineAction::UpdateItem(PendingUpdate::new(
            "missing",
            TimelineItem::success(lines::TX_PREPARED, "prepared"),
        )),
        TimelineAction::UpdateGroup {
            group_id: "g1".to_string(),
            patch: GroupPatch::status(LineStatus::Error),
        },
        TimelineAction::AddGroup(TimelineGroup::new("g2", "Sell")),
        TimelineAction::DeleteGroup("g2".to_string()),
    ];

    let timeline = actions.into_iter().fold(Timeline::new(), Timeline::reduce);

    assert_eq!(timeline.len(), 1);
    let group = timeline.group("g1").unwrap();
    assert_eq!(group.status, LineStatus::Error);
    assert_eq!(group.lines.len(), 1);
}

#[test]
fn test_entry_lines_suffix_only_for_multiple_entries() {
    let single = lines::EntryLines::for_entry(0, 1);
    assert_eq!(single.sent, lines::TX_SENT);
    assert_eq!(single.minted, lines::MINTED);

    let second = lines::EntryLines::for_entry(1, 3);
    assert_eq!(second.sent, "txSent-1");
    assert_eq!(second.included, "txIncluded-1");
    assert_eq!(second.minted, "minted-1");
}

#[test]
fn test_timeline_serializes_camel_case() {
    let mut timeline = timeline_with("g1");
    timeline.update_item("g1", TimelineItem::success(lines::TX_SIGNED, "signed"));

    let json = serde_json::to_value(&timeline).unwrap();
    let group = &json["groups"][0];
    assert_eq!(group["groupId"], "g1");
    assert_eq!(group["keepOnTop"], false);
    assert_eq!(group["lines"][0]["lineId"], "txSigned");
    assert_eq!(group["lines"][0]["status"], "success");
}

use calwatch::extractor::extract;
use calwatch::types::{serialize_events, EventTime, ScheduleMode};
use chrono::NaiveDate;

fn june_23() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 23).unwrap()
}

#[test]
fn owner_keyed_entry_survives_and_past_sequence_entry_is_dropped() {
    let html = r#"
        <html><head><title>テストカレンダー</title></head><body>
        <div id="ccexp-12345-2025-06-25">10:00 Meeting</div>
        <div id="ccexp-2025-06-20-1">Old Task</div>
        </body></html>
    "#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].to_string(), "🔹 06/25 10:00 - Meeting");
}

#[test]
fn past_events_never_appear_in_any_mode() {
    let html = r#"
        <div id="ccexp-12345-2025-06-22">9:00 Yesterday</div>
        <div id="ccexp-2025-06-01-3">Long gone</div>
    "#;
    for mode in [ScheduleMode::TodayOnly, ScheduleMode::AllFuture] {
        assert!(extract(html, "12345", mode, june_23()).is_empty());
    }
}

#[test]
fn today_only_mode_keeps_exactly_today() {
    let html = r#"
        <div id="ccexp-12345-2025-06-23">8:30 Standup</div>
        <div id="ccexp-12345-2025-06-25">10:00 Later</div>
    "#;
    let today = extract(html, "12345", ScheduleMode::TodayOnly, june_23());
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].description, "Standup");

    let all = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(all.len(), 2);
}

#[test]
fn missing_time_prefix_becomes_all_day() {
    let html = r#"<div id="ccexp-2025-07-01-1">休暇</div>"#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].time, EventTime::AllDay);
    assert_eq!(events[0].to_string(), "🔹 07/01 終日 - 休暇");
}

#[test]
fn single_digit_hour_time_is_recognized() {
    let html = r#"<div id="ccexp-2025-07-01-1">9:15 朝会</div>"#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(events[0].time, EventTime::At("9:15".to_string()));
    assert_eq!(events[0].description, "朝会");
}

#[test]
fn descendant_text_is_collapsed_to_single_spaces() {
    let html = r#"
        <div id="ccexp-12345-2025-06-25">
            <span>10:00</span>
            <span>Design
                review</span>
        </div>
    "#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].description, "Design review");
}

#[test]
fn whitespace_only_entries_are_skipped() {
    let html = r#"
        <div id="ccexp-12345-2025-06-25">   </div>
        <div id="ccexp-12345-2025-06-26"><span> </span></div>
    "#;
    assert!(extract(html, "12345", ScheduleMode::AllFuture, june_23()).is_empty());
}

#[test]
fn malformed_ids_are_skipped_without_killing_the_rest() {
    let html = r#"
        <div id="ccexp-2025-06">Too short</div>
        <div id="ccexp-banana-cherry-date-kiwi">Not numeric</div>
        <div id="ccexp-12345-2025-02-30">Impossible date</div>
        <div id="ccexp-12345-2025-06-25">10:00 Still here</div>
    "#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].description, "Still here");
}

#[test]
fn empty_page_yields_empty_list() {
    assert!(extract("", "12345", ScheduleMode::AllFuture, june_23()).is_empty());
    assert!(extract(
        "<html><body><p>nothing here</p></body></html>",
        "12345",
        ScheduleMode::AllFuture,
        june_23()
    )
    .is_empty());
}

#[test]
fn output_is_sorted_by_month_then_day_and_deduplicated() {
    let html = r#"
        <div id="ccexp-2025-12-01-1">December</div>
        <div id="ccexp-12345-2025-06-25">10:00 June late</div>
        <div id="ccexp-12345-2025-06-24">June early</div>
        <div id="ccexp-2025-06-25-2">10:00 June late</div>
    "#;
    let events = extract(html, "12345", ScheduleMode::AllFuture, june_23());
    let lines = serialize_events(&events);
    assert_eq!(
        lines,
        "🔹 06/24 終日 - June early\n🔹 06/25 10:00 - June late\n🔹 12/01 終日 - December"
    );
}

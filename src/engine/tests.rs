use super::*;

const H: Minute = 60;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

fn scheduler() -> Scheduler {
    Scheduler::new(SchedulerConfig::default(), day())
}

fn stylist(name: &str) -> Resource {
    Resource {
        id: format!("sty_{name}"),
        name: name.into(),
        color: "#3b82f6".into(),
    }
}

fn booking(resource: &str, start: Minute, duration: i64) -> Appointment {
    booking_named(resource, "Client", start, duration)
}

fn booking_named(resource: &str, client: &str, start: Minute, duration: i64) -> Appointment {
    let w = DayWindow::new(day(), 0, 24, 1);
    Appointment {
        id: Ulid::new(),
        client_name: client.into(),
        resource_name: Some(resource.into()),
        resource_color: None,
        start: w.instant_at(start),
        duration_minutes: Some(duration),
        phase: Phase::Upcoming,
    }
}

fn index_of(s: &Scheduler, appointments: &[Appointment]) -> IntervalIndex {
    s.build_index(appointments, &[stylist("R"), stylist("Q")])
}

/// Deterministic pseudo-random day: non-overlapping bookings on R.
fn packed_day(seed: u64) -> Vec<Appointment> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as i64
    };
    let mut out = Vec::new();
    let mut t = 9 * H + next() % 30;
    while t < 20 * H {
        let dur = 5 + next() % 55;
        if t + dur > 20 * H {
            break;
        }
        out.push(booking("R", t, dur));
        t += dur + next() % 40;
    }
    out
}

// ── Scenarios ─────────────────────────────────────────────

#[test]
fn scenario_a_next_free_after_booking() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 10 * H, 30)]);
    assert!(!s.can_fit(&idx, Some("R"), 10 * H, Some(15)));
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 10 * H, Some(15), None),
        Some(10 * H + 30)
    );
}

#[test]
fn scenario_b_running_past_closing_is_out_of_window() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 10 * H, 30)]);
    let placement = s.validate_placement(&idx, Some("R"), 19 * H + 30, Some(60), None);
    assert_eq!(
        placement,
        Placement::Rejected(Rejection::OutOfWindow {
            candidate: Span::new(19 * H + 30, 20 * H + 30),
            window: Span::new(9 * H, 20 * H),
        })
    );
}

#[test]
fn scenario_c_overlap_reports_first_conflict_and_suggestion() {
    let s = scheduler();
    let first = booking_named("R", "Ana", 9 * H, 30);
    let second = booking_named("R", "Bea", 9 * H + 30, 30);
    let idx = index_of(&s, &[first.clone(), second]);

    let placement = s.validate_placement(&idx, Some("R"), 9 * H + 15, Some(30), None);
    match placement {
        Placement::Rejected(Rejection::Overlap {
            conflict,
            suggestion,
        }) => {
            assert_eq!(conflict.appointment_id, first.id);
            assert_eq!(conflict.span, Span::new(9 * H, 9 * H + 30));
            assert_eq!(conflict.label, "Ana");
            assert_eq!(suggestion, Some(10 * H));
        }
        other => panic!("expected overlap, got {other:?}"),
    }
}

#[test]
fn scenario_d_empty_resource_accepts() {
    let s = scheduler();
    let idx = index_of(&s, &[]);
    for start in [9 * H, 12 * H + 15, 19 * H + 30] {
        assert_eq!(
            s.validate_placement(&idx, Some("R"), start, Some(30), None),
            Placement::Accepted(Span::new(start, start + 30))
        );
    }
}

#[test]
fn scenario_e_reschedule_onto_own_slot() {
    let s = scheduler();
    let own = booking("R", 11 * H, 45);
    let idx = index_of(&s, &[own.clone()]);
    assert!(
        s.validate_placement(&idx, Some("R"), 11 * H, Some(45), Some(own.id))
            .is_accepted()
    );
    // without the exclusion it collides with itself
    assert!(
        !s.validate_placement(&idx, Some("R"), 11 * H, Some(45), None)
            .is_accepted()
    );
}

// ── Boundaries ────────────────────────────────────────────

#[test]
fn touching_intervals_are_accepted_on_both_sides() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 12 * H, 60)]);
    // ends exactly when the booking starts
    assert!(s.can_fit(&idx, Some("R"), 11 * H, Some(60)));
    // starts exactly when the booking ends
    assert!(s.can_fit(&idx, Some("R"), 13 * H, Some(60)));
    // one minute into it
    assert!(!s.can_fit(&idx, Some("R"), 11 * H + 1, Some(60)));
}

#[test]
fn window_edges() {
    let s = scheduler();
    let idx = index_of(&s, &[]);
    assert!(s.can_fit(&idx, Some("R"), 9 * H, Some(30)));
    assert!(!s.can_fit(&idx, Some("R"), 9 * H - 15, Some(30)));
    assert!(s.can_fit(&idx, Some("R"), 19 * H + 30, Some(30)));
    assert!(!s.can_fit(&idx, Some("R"), 19 * H + 31, Some(30)));
}

#[test]
fn out_of_window_wins_over_overlap() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 19 * H, 60)]);
    let placement = s.validate_placement(&idx, Some("R"), 19 * H + 30, Some(60), None);
    assert!(matches!(
        placement,
        Placement::Rejected(Rejection::OutOfWindow { .. })
    ));
}

#[test]
fn overlap_without_room_left_has_no_suggestion() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 18 * H, 120)]);
    let placement = s.validate_placement(&idx, Some("R"), 18 * H, Some(60), None);
    assert_eq!(
        placement,
        Placement::Rejected(Rejection::Overlap {
            conflict: idx.intervals("R")[0].clone(),
            suggestion: None,
        })
    );
}

#[test]
fn other_resources_do_not_conflict() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("Q", 10 * H, 60)]);
    assert!(s.can_fit(&idx, Some("R"), 10 * H, Some(60)));
}

#[test]
fn unassigned_only_checks_the_window() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 10 * H, 60)]);
    assert!(s.can_fit(&idx, None, 10 * H, Some(60)));
    assert!(!s.can_fit(&idx, None, 8 * H, Some(60)));
}

#[test]
fn malformed_duration_is_normalized() {
    let s = scheduler();
    let idx = index_of(&s, &[]);
    assert_eq!(
        s.validate_placement(&idx, Some("R"), 10 * H, Some(-20), None),
        Placement::Accepted(Span::new(10 * H, 10 * H + 30))
    );
    assert_eq!(
        s.validate_placement(&idx, Some("R"), 10 * H, None, None),
        Placement::Accepted(Span::new(10 * H, 10 * H + 30))
    );
    // a day-long request cannot fit an 11-hour window
    assert!(!s.can_fit(&idx, Some("R"), 9 * H, Some(100_000)));
}

// ── Free-slot search ──────────────────────────────────────

#[test]
fn search_snaps_backward_to_grid() {
    let s = scheduler();
    let idx = index_of(&s, &[]);
    // 10:07 on a 15-minute grid starts scanning at 10:00
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 10 * H + 7, Some(15), None),
        Some(10 * H)
    );
}

#[test]
fn search_before_opening_starts_at_opening() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 9 * H, 45)]);
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 7 * H, Some(30), None),
        Some(9 * H + 45)
    );
}

#[test]
fn search_fails_when_remaining_window_too_short() {
    let s = scheduler();
    let idx = index_of(&s, &[]);
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 19 * H + 45, Some(30), None),
        None
    );
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 19 * H + 30, Some(30), None),
        Some(19 * H + 30)
    );
}

#[test]
fn search_fails_on_fully_booked_day() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 9 * H, 11 * 60)]);
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 9 * H, Some(15), None),
        None
    );
}

#[test]
fn search_skips_gaps_shorter_than_duration() {
    let s = scheduler();
    let idx = index_of(
        &s,
        &[
            booking("R", 9 * H, 60),
            booking("R", 10 * H + 15, 60),
            booking("R", 11 * H + 45, 15),
        ],
    );
    // 10:00-10:15 and 11:15-11:45 are too short for 45 minutes
    assert_eq!(
        s.find_next_free_start(&idx, Some("R"), 9 * H, Some(45), None),
        Some(12 * H)
    );
}

#[test]
fn search_result_always_passes_can_fit() {
    let s = scheduler();
    for seed in 0..40 {
        let aps = packed_day(seed);
        let idx = index_of(&s, &aps);
        for dur in [15, 30, 45, 60, 90] {
            for from in (8 * H..20 * H).step_by(20) {
                match s.find_next_free_start(&idx, Some("R"), from, Some(dur), None) {
                    Some(start) => {
                        assert!(s.can_fit(&idx, Some("R"), start, Some(dur)));
                        assert_eq!((start - 9 * H) % 15, 0, "result must sit on the grid");
                    }
                    None if from > 20 * H - dur => {}
                    None => {
                        // no grid start from the snapped point onward fits
                        let begin = (from - (from - 9 * H).rem_euclid(15)).max(9 * H);
                        let mut t = begin;
                        while t + dur <= 20 * H {
                            assert!(!s.can_fit(&idx, Some("R"), t, Some(dur)));
                            t += 15;
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn gap_walk_matches_linear_scan() {
    let s = scheduler();
    let w = *s.window();
    for seed in 0..60 {
        let aps = packed_day(seed);
        let idx = index_of(&s, &aps);
        let exclude = aps.get(seed as usize % aps.len().max(1)).map(|a| a.id);
        for dur in [1, 10, 15, 25, 60, 120] {
            for from in (7 * H..21 * H).step_by(7) {
                for ex in [None, exclude] {
                    assert_eq!(
                        find_next_free_start(&idx, &w, Some("R"), from, dur, ex),
                        find_next_free_start_in_gaps(&idx, &w, Some("R"), from, dur, ex),
                        "seed={seed} dur={dur} from={from} exclude={ex:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn free_spans_complement_bookings() {
    let s = scheduler();
    let idx = index_of(&s, &[booking("R", 10 * H, 30), booking("R", 10 * H + 30, 30)]);
    assert_eq!(
        s.free_spans(&idx, Some("R"), None),
        vec![Span::new(9 * H, 10 * H), Span::new(11 * H, 20 * H)]
    );
    assert_eq!(
        s.free_spans(&idx, Some("R"), Some(2 * H)),
        vec![Span::new(11 * H, 20 * H)]
    );
}

// ── Properties ────────────────────────────────────────────

#[test]
fn gap_contained_sub_intervals_never_overlap() {
    let s = scheduler();
    for seed in 0..30 {
        let aps = packed_day(seed);
        let idx = index_of(&s, &aps);
        for gap in s.free_spans(&idx, Some("R"), None) {
            for start in gap.start..gap.end {
                for end in [start + 1, (start + 7).min(gap.end), gap.end] {
                    if end <= start {
                        continue;
                    }
                    let sub = Span::new(start, end);
                    assert!(find_overlap(&idx, Some("R"), &sub, None).is_none());
                }
            }
        }
    }
}

#[test]
fn accepted_placements_keep_the_invariant() {
    let s = scheduler();
    for seed in 0..20 {
        let mut aps = packed_day(seed);
        let idx = index_of(&s, &aps);
        assert!(exclusivity_violations(&idx, "R").is_empty());

        // greedily place more bookings wherever accepted, then re-check everything
        for start in slot_starts(9, 20, 15) {
            let idx = index_of(&s, &aps);
            if let Placement::Accepted(span) =
                s.validate_placement(&idx, Some("R"), start, Some(20), None)
            {
                assert!(s.window().contains(&span));
                aps.push(booking("R", span.start, span.duration()));
            }
        }
        let idx = index_of(&s, &aps);
        assert!(exclusivity_violations(&idx, "R").is_empty());
    }
}

#[test]
fn validation_is_idempotent() {
    let s = scheduler();
    let aps = packed_day(7);
    let idx = index_of(&s, &aps);
    for start in slot_starts(8, 20, 5) {
        let first = s.validate_placement(&idx, Some("R"), start, Some(40), None);
        let second = s.validate_placement(&idx, Some("R"), start, Some(40), None);
        assert_eq!(first, second);
    }
}

#[test]
fn violations_detected_on_double_booked_input() {
    let s = scheduler();
    let a = booking("R", 10 * H, 60);
    let b = booking("R", 10 * H + 30, 60);
    let idx = index_of(&s, &[a.clone(), b.clone()]);
    assert_eq!(exclusivity_violations(&idx, "R"), vec![(a.id, b.id)]);
}

#[test]
fn rejection_display_is_human_readable() {
    let s = scheduler();
    let idx = index_of(&s, &[booking_named("R", "Ana", 9 * H, 30)]);
    let rejection = s
        .validate_placement(&idx, Some("R"), 9 * H, Some(30), None)
        .into_result()
        .unwrap_err();
    assert_eq!(
        rejection.to_string(),
        "overlaps \"Ana\" (09:00–09:30); next free start 09:30"
    );
    assert_eq!(rejection.kind(), "overlap");
    assert_eq!(rejection.suggestion(), Some(9 * H + 30));
}

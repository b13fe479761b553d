//! Card scanning through the coordinator: front, flip delay, back, done.

mod common;

use std::time::Duration;

use common::mock_camera::MockCamera;
use common::mock_engine::{EngineProbe, MockEngine};
use common::test_frames::camera_frame;
use doc_lens::card::CardPhase;
use doc_lens::config::LensConfig;
use doc_lens::engine::{CardDetection, CardDetectorParams, CardStatus, CardTargets, LcdResult};
use doc_lens::error::LensError;
use doc_lens::{CaptureCoordinator, DispatchOutcome, SkipReason, TickOutcome};

const CLIENT: &str = "client-1";

fn reading(status: CardStatus, number: &str, name: &str, date: &str, cvv: &str) -> CardDetection {
    CardDetection {
        status,
        number: number.into(),
        name: name.into(),
        date: date.into(),
        cvv: cvv.into(),
    }
}

fn card_lens(engine: MockEngine) -> (CaptureCoordinator, EngineProbe) {
    let probe = engine.probe();
    let config = LensConfig {
        flip_delay_ms: 3000,
        lcd_interval: 5,
        ..Default::default()
    };
    let lens = CaptureCoordinator::builder()
        .with_config(config)
        .with_engine(Box::new(engine))
        .with_camera(Box::new(MockCamera::new(camera_frame())))
        .manual_ticks()
        .build()
        .unwrap();
    (lens, probe)
}

async fn phase_after_tick(lens: &CaptureCoordinator) -> CardPhase {
    match lens.tick().await.unwrap().settled().await {
        Some(DispatchOutcome::CardProgress { phase }) => phase,
        other => panic!("expected card progress, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_front_flip_back_done() {
    let engine = MockEngine::new()
        .with_cards(vec![
            reading(CardStatus::Waiting, "4111 1111 1111 1111", "", "", ""),
            reading(CardStatus::Done, "", "JANE DOE", "12/29", ""),
            reading(CardStatus::Waiting, "", "", "", "123"),
        ])
        .with_lcd(LcdResult {
            lcd_prob: 0.1,
            obj_prob: 0.9,
        });
    let (lens, probe) = card_lens(engine);

    lens.init_card(None, CLIENT).await.unwrap();
    assert_eq!(probe.count("init_card_detector:30-80"), 1);
    lens.start_camera().await.unwrap();
    assert_eq!(lens.card_phase().await, Some(CardPhase::ScanningFront));

    assert_eq!(phase_after_tick(&lens).await, CardPhase::ScanningFront);
    assert_eq!(lens.lcd_status().await.map(|l| l.obj_prob), Some(0.9));

    // Front done: the same reading already narrows the targets to the back.
    assert_eq!(phase_after_tick(&lens).await, CardPhase::FlipCard);
    assert_eq!(
        probe.resets(),
        vec![CardTargets {
            number: false,
            name: false,
            date: false,
            cvv: true,
        }]
    );

    let flipping = lens.tick().await.unwrap();
    assert!(matches!(flipping, TickOutcome::Skipped(SkipReason::Flipping)));
    tokio::time::advance(Duration::from_millis(2900)).await;
    assert!(matches!(
        lens.tick().await.unwrap(),
        TickOutcome::Skipped(SkipReason::Flipping)
    ));
    assert_eq!(probe.count("card_process_frame"), 2);

    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(phase_after_tick(&lens).await, CardPhase::Done);

    let fields = lens.card_data().await.unwrap();
    assert_eq!(fields.number.as_deref(), Some("4111 1111 1111 1111"));
    assert_eq!(fields.name.as_deref(), Some("JANE DOE"));
    assert_eq!(fields.date.as_deref(), Some("12/29"));
    assert_eq!(fields.cvv.as_deref(), Some("123"));
    assert!(probe.count("release_callback") >= 1);

    assert!(matches!(
        lens.tick().await.unwrap(),
        TickOutcome::Skipped(SkipReason::CardFinished)
    ));
    assert_eq!(probe.count("card_process_frame"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_next_tick_waits_until_the_reading_is_applied() {
    let engine = MockEngine::new()
        .with_cards(vec![reading(CardStatus::Done, "4111 1111 1111 1111", "", "", "")])
        .with_action_delay(Duration::from_millis(500));
    let (lens, probe) = card_lens(engine);
    lens.init_card(None, CLIENT).await.unwrap();
    lens.start_camera().await.unwrap();

    let first = lens.tick().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The reading is back but its reset is still being sent.
    assert_eq!(probe.count("card_process_frame"), 1);
    assert!(probe.resets().is_empty());
    assert!(lens.is_busy());
    assert!(matches!(
        lens.tick().await.unwrap(),
        TickOutcome::Skipped(SkipReason::Busy)
    ));

    assert_eq!(
        first.settled().await,
        Some(DispatchOutcome::CardProgress {
            phase: CardPhase::FlipCard
        })
    );
    assert_eq!(probe.resets().len(), 1);
    assert!(!lens.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_empty_readings_never_erase_fields() {
    let engine = MockEngine::new().with_cards(vec![
        reading(CardStatus::Waiting, "5500 0000 0000 0004", "", "", ""),
        reading(CardStatus::Waiting, "", "", "", ""),
        reading(CardStatus::DocumentNotDetected, "  ", "", "", ""),
    ]);
    let (lens, _) = card_lens(engine);
    lens.init_card(None, CLIENT).await.unwrap();
    lens.start_camera().await.unwrap();

    for _ in 0..3 {
        assert_eq!(phase_after_tick(&lens).await, CardPhase::ScanningFront);
    }
    let fields = lens.card_data().await.unwrap();
    assert_eq!(fields.number.as_deref(), Some("5500 0000 0000 0004"));
    assert!(fields.name.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_forced_capture_finishes_the_scan() {
    let engine = MockEngine::new()
        .with_cards(vec![reading(CardStatus::Waiting, "4111 1111 1111 1111", "", "", "")])
        .with_forced(reading(CardStatus::Waiting, "", "JANE DOE", "", ""));
    let (lens, probe) = card_lens(engine);
    lens.init_card(None, CLIENT).await.unwrap();
    lens.start_camera().await.unwrap();
    phase_after_tick(&lens).await;

    let fields = lens.capture_card().await.unwrap();
    assert_eq!(fields.number.as_deref(), Some("4111 1111 1111 1111"));
    assert_eq!(fields.name.as_deref(), Some("JANE DOE"));
    assert_eq!(lens.card_phase().await, Some(CardPhase::Done));
    assert_eq!(probe.count("force_card_result"), 1);

    // Capturing again hands back the finished result without asking the engine.
    assert_eq!(lens.capture_card().await.unwrap(), fields);
    assert_eq!(probe.count("force_card_result"), 1);
}

#[tokio::test]
async fn test_card_window_must_span_fifty_percent() {
    let (lens, probe) = card_lens(MockEngine::new());
    let params = CardDetectorParams {
        top: 30,
        bottom: 90,
        ..Default::default()
    };
    let err = lens.init_card_with(None, CLIENT, params).await.unwrap_err();
    assert!(matches!(err, LensError::Validation { .. }));
    assert!(!lens.has_init().await);
    assert!(probe.calls().iter().all(|c| !c.starts_with("init_card_detector")));
}

#[tokio::test]
async fn test_capture_card_outside_card_mode_is_rejected() {
    let (lens, _) = card_lens(MockEngine::new());
    lens.init_document(None, CLIENT).await.unwrap();
    assert!(matches!(lens.capture_card().await, Err(LensError::State { .. })));
}

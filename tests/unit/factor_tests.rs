//! Unit tests for the six factor analyzers.

use chrono::{NaiveDate, NaiveDateTime};

use lead_responder::engine::context::{DecisionContext, RawContext};
use lead_responder::engine::factors::{
    business_priority, conversation_momentum, customer_engagement, message_urgency,
    response_expectation, time_appropriateness, FactorScores, Indicator,
};
use lead_responder::models::lead::LeadProfile;
use lead_responder::models::message::Message;

const EPS: f64 = 1e-9;

fn tuesday_afternoon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 4)
        .unwrap()
        .and_hms_opt(14, 0, 0)
        .unwrap()
}

fn saturday_night() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 8)
        .unwrap()
        .and_hms_opt(22, 0, 0)
        .unwrap()
}

fn ctx_with(
    message: &str,
    history_len: usize,
    vehicle: Option<&str>,
    time: NaiveDateTime,
) -> DecisionContext {
    let history = (0..history_len)
        .map(|i| Message::inbound("lead-1", format!("earlier {i}")))
        .collect();
    let lead = LeadProfile::new(Some("Dana Smith".into()), vehicle.map(str::to_owned));
    DecisionContext::build(message, RawContext::new(history, lead, time))
}

fn ctx(message: &str) -> DecisionContext {
    ctx_with(message, 0, None, tuesday_afternoon())
}

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn urgency_counts_each_keyword_and_one_question() {
    let score = message_urgency(&ctx("Can you tell me the price today? Need to know ASAP"));
    approx(score.score, 0.8);
    assert_eq!(
        score.indicators,
        vec![Indicator::UrgencyKeyword, Indicator::QuestionAsked]
    );
}

#[test]
fn urgency_is_case_insensitive() {
    approx(message_urgency(&ctx("URGENT")).score, 0.3);
}

#[test]
fn urgency_question_bonus_applies_once() {
    approx(message_urgency(&ctx("what? when? how?")).score, 0.2);
}

#[test]
fn urgency_rewards_long_messages() {
    let long = "x".repeat(101);
    let score = message_urgency(&ctx(&long));
    approx(score.score, 0.1);
    assert_eq!(score.indicators, vec![Indicator::DetailedMessage]);
    approx(message_urgency(&ctx(&"x".repeat(100))).score, 0.0);
}

#[test]
fn urgency_is_clamped_to_one() {
    let text = "urgent asap today immediately emergency tonight?";
    approx(message_urgency(&ctx(text)).score, 1.0);
}

#[test]
fn plain_acknowledgement_has_no_urgency() {
    let score = message_urgency(&ctx("ok thanks"));
    approx(score.score, 0.0);
    assert!(score.indicators.is_empty());
}

#[test]
fn momentum_reflects_history_and_engagement() {
    approx(conversation_momentum(&ctx_with("hi", 0, None, tuesday_afternoon())).score, 0.5);
    approx(conversation_momentum(&ctx_with("hi", 1, None, tuesday_afternoon())).score, 0.7);
    approx(conversation_momentum(&ctx_with("hi", 4, None, tuesday_afternoon())).score, 0.8);
    approx(conversation_momentum(&ctx_with("hi", 6, None, tuesday_afternoon())).score, 1.0);
}

#[test]
fn time_appropriateness_rewards_business_hours() {
    let score = time_appropriateness(&ctx("hi"));
    approx(score.score, 0.8);
    assert_eq!(score.indicators, vec![Indicator::BusinessHours]);
}

#[test]
fn time_appropriateness_penalises_weekend_nights() {
    let score = time_appropriateness(&ctx_with("hi", 0, None, saturday_night()));
    approx(score.score, 0.2);
    assert_eq!(score.indicators, vec![Indicator::AfterHours, Indicator::Weekend]);
}

#[test]
fn engagement_rewards_volume_and_high_tier() {
    approx(customer_engagement(&ctx_with("hi", 3, None, tuesday_afternoon())).score, 0.5);
    approx(customer_engagement(&ctx_with("hi", 4, None, tuesday_afternoon())).score, 0.7);
    approx(customer_engagement(&ctx_with("hi", 6, None, tuesday_afternoon())).score, 1.0);
}

#[test]
fn business_priority_rewards_specific_vehicle_and_depth() {
    approx(business_priority(&ctx_with("hi", 0, Some("SUV"), tuesday_afternoon())).score, 0.5);
    approx(
        business_priority(&ctx_with("hi", 0, Some("2024 Honda Accord"), tuesday_afternoon())).score,
        0.7,
    );
    approx(
        business_priority(&ctx_with("hi", 3, Some("2024 Honda Accord"), tuesday_afternoon())).score,
        0.9,
    );
}

#[test]
fn response_expectation_rewards_questions_and_requests() {
    approx(response_expectation(&ctx("ok thanks")).score, 0.5);
    approx(response_expectation(&ctx("is it available?")).score, 0.9);
    approx(response_expectation(&ctx("please send me photos")).score, 0.7);
    approx(response_expectation(&ctx("Can you tell me the price today? Need to know ASAP")).score, 1.0);
}

#[test]
fn all_scores_stay_in_unit_interval() {
    let samples = [
        ctx("ok"),
        ctx_with("urgent asap today now?", 10, Some("2024 Honda Accord EX-L"), tuesday_afternoon()),
        ctx_with("", 0, None, saturday_night()),
    ];
    for sample in &samples {
        let scores = FactorScores::analyze(sample);
        assert!(scores.validate().is_ok());
        for (_, factor) in scores.named() {
            assert!((0.0..=1.0).contains(&factor.score));
        }
    }
}

#[test]
fn indicator_tags_and_phrases_are_distinct() {
    assert_eq!(Indicator::UrgencyKeyword.tag(), "urgency_keyword");
    assert_ne!(Indicator::BusinessHours.phrase(), Indicator::AfterHours.phrase());
}

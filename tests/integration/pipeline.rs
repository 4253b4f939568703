//! Validate → price pipeline driven through the public gateway API.

use futures::future::join_all;
use secrecy::SecretString;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use errand_pricer::pricing::{GatewayConfig, PriceEstimationGateway};
use errand_pricer::types::{PricingError, PricingMode, RawErrand};
use errand_pricer::validator::RequestValidator;

use crate::mock_model::{recommendation, Reply, ScriptedModel};

const PICKUP: &str = "-1.28300, 36.81700";
const DROPOFF: &str = "-1.31300, 36.83900";

fn gateway(model: &ScriptedModel, config: GatewayConfig) -> PriceEstimationGateway {
    PriceEstimationGateway::new(Arc::new(model.clone()), config).unwrap()
}

fn grocery() -> RawErrand {
    RawErrand {
        task_type: Some("Grocery shopping".into()),
        pickup_location: Some("Westlands Mall".into()),
        dropoff_location: Some("My home address".into()),
        notes: Some("2 litres of milk".into()),
        budget_estimate: Some("Ksh 500 - Ksh 800".into()),
        ..Default::default()
    }
}

fn bill_run_with_budget() -> RawErrand {
    RawErrand {
        task_type: Some("Paying bills".into()),
        pickup_location: Some(PICKUP.into()),
        dropoff_location: Some(DROPOFF.into()),
        budget_estimate: Some("Ksh 9,999".into()),
        dispatcher_name: Some("Otieno".into()),
        dispatcher_phone: Some("+254712345678".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_grocery_errand_end_to_end() {
    let model = ScriptedModel::answering(
        "Ksh 600 - Ksh 750",
        "Share a shopping list in advance. Pay the errand fee on delivery.",
    );
    let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));

    let (request, result) = assert_ok!(gw.validate_and_estimate(&grocery()).await);

    assert_eq!(request.budget_estimate(), Some("Ksh 500 - Ksh 800"));
    assert!(!result.recommended_price_range.is_empty());
    assert!(!result.intelligent_prompts.is_empty());
    assert!(result.map_url.is_none());

    let range = result.parsed_price_range().unwrap();
    assert_eq!(range.currency.as_deref(), Some("Ksh"));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("Westlands Mall"));
    assert!(prompts[0].user.contains("2 litres of milk"));
    assert!(prompts[0].user.contains("Ksh 500 - Ksh 800"));
}

#[tokio::test]
async fn test_invalid_errands_never_reach_the_model() {
    let model = ScriptedModel::answering("Ksh 100", "tips");
    let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));

    let cases = [
        RawErrand {
            task_type: None,
            ..grocery()
        },
        RawErrand {
            pickup_location: Some("ab".into()),
            ..grocery()
        },
        RawErrand {
            dropoff_location: Some("  x  ".into()),
            ..grocery()
        },
        RawErrand::default(),
    ];

    for raw in &cases {
        match gw.validate_and_estimate(raw).await {
            Err(PricingError::Validation(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_market_rate_excludes_budget_from_prompt() {
    let model = ScriptedModel::answering("Ksh 300 - Ksh 400", "Have the account number ready.");
    let gw = gateway(&model, GatewayConfig::new(PricingMode::MarketRate));

    let (request, _) = assert_ok!(gw.validate_and_estimate(&bill_run_with_budget()).await);
    assert!(request.budget_estimate().is_none());
    assert_eq!(request.dispatcher(), Some(("Otieno", "+254712345678")));

    let prompt = &model.prompts()[0];
    assert!(!prompt.system.contains("9,999"));
    assert!(!prompt.user.contains("9,999"));
    assert!(prompt.user.contains("Otieno"));
}

#[tokio::test]
async fn test_request_from_other_mode_is_rejected() {
    let model = ScriptedModel::answering("Ksh 300", "tips");
    let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));

    let market_request = RequestValidator::new(PricingMode::MarketRate)
        .validate(&bill_run_with_budget())
        .unwrap();
    match gw.estimate(&market_request).await {
        Err(PricingError::Validation(errors)) => assert!(errors.field("pricingMode").is_some()),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_nonconforming_replies_are_estimation_errors() {
    let replies = [
        String::new(),
        "Around Ksh 500 should do.".to_string(),
        r#"{"recommendedPriceRange":"Ksh 500 - Ksh 700"}"#.to_string(),
        recommendation("", "tips"),
        recommendation("Ksh 500", "   "),
    ];

    for reply in replies {
        let model = ScriptedModel::new(vec![Reply::Text(reply.clone())]);
        let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));
        let err = assert_err!(gw.validate_and_estimate(&grocery()).await);
        assert!(
            matches!(err, PricingError::Estimation { .. }),
            "reply {reply:?} gave {err:?}"
        );
        assert_eq!(err.to_string(), "could not generate a price recommendation");
    }
}

#[tokio::test]
async fn test_upstream_failure_is_not_retried() {
    let model = ScriptedModel::unreachable();
    let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));

    let err = assert_err!(gw.validate_and_estimate(&grocery()).await);
    assert!(matches!(err, PricingError::UpstreamUnavailable(_)));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_route_preview_for_coordinates() {
    let model = ScriptedModel::answering("Ksh 300 - Ksh 400", "Carry the bill.");
    let config = GatewayConfig::new(PricingMode::MarketRate)
        .with_map_key(SecretString::new("maps-test-key".into()));
    let gw = gateway(&model, config);
    assert!(gw.derives_route_preview());

    let (_, result) = assert_ok!(gw.validate_and_estimate(&bill_run_with_budget()).await);
    let url = result.map_url.unwrap();

    let parsed = reqwest::Url::parse(&url).unwrap();
    let markers: Vec<String> = parsed
        .query_pairs()
        .filter(|(k, _)| k == "markers")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(markers.len(), 2);
    assert!(markers[0].contains("label:A") && markers[0].ends_with(PICKUP));
    assert!(markers[1].contains("label:B") && markers[1].ends_with(DROPOFF));

    // Same errand, same URL.
    let (_, again) = assert_ok!(gw.validate_and_estimate(&bill_run_with_budget()).await);
    assert_eq!(again.map_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_concurrent_estimates_are_independent() {
    let model = ScriptedModel::new(vec![
        Reply::Text(recommendation("Ksh 500 - Ksh 600", "a")),
        Reply::Down("rate limited".into()),
        Reply::Text(recommendation("Ksh 700 - Ksh 800", "b")),
    ]);
    let gw = gateway(&model, GatewayConfig::new(PricingMode::BudgetAnchored));
    let errand = grocery();

    let outcomes = join_all((0..3).map(|_| gw.validate_and_estimate(&errand))).await;

    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    let down = outcomes
        .iter()
        .filter(|o| matches!(o, Err(PricingError::UpstreamUnavailable(_))))
        .count();
    assert_eq!((ok, down), (2, 1));
    assert_eq!(model.calls(), 3);
}

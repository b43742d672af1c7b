//! The Group record and its assembly from aggregate + enrichment.
//!
//! Field names and nesting match the snapshot schema read by the
//! graph front end; do not rename without updating the consumers.

use crate::{
    aggregate::{GroupAggregate, BASE_LAT, BASE_LNG, JITTER_HALF_WIDTH},
    enrichment::payload::{AssetCondition, EnrichmentPayload},
    enrichment::fallback,
    name_generator::NameGenerator,
    risk::RiskBand,
    rng::{GroupRng, RngBank, RngSlot},
    types::{CustomerId, GroupId},
    visual::{node_size, visual_priority, VisualPriority},
    wiring::Neighbor,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trust above this is eligible for a new loan without review.
pub const ELIGIBILITY_THRESHOLD: u8 = 70;
pub const CANVAS_EXTENT: i64 = 1000;
const MONTHS: [&str; 6] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun"];
const SEASONALITY: [u8; 12] = [1, 1, 1, 2, 2, 3, 1, 1, 1, 1, 1, 1];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    #[serde(rename = "type")]
    pub risk: RiskBand,
    pub size: u32,
    pub x: i64,
    pub y: i64,
    pub lat: f64,
    pub lng: f64,
    pub members: Vec<CustomerId>,
    pub header: Header,
    pub overview: Overview,
    pub trends: Trends,
    pub insights: Insights,
    pub decision: Decision,
}

impl Group {
    pub fn trust_score(&self) -> u8 {
        self.header.trust_score
    }

    pub fn is_placeholder(&self) -> bool {
        self.header.placeholder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub location_city: String,
    pub location_village: String,
    pub member_count: usize,
    pub risk_badge: String,
    pub trust_score: u8,
    pub loan_eligibility: String,
    pub total_loan_amount: i64,
    pub visual_priority: VisualPriority,
    /// Set only on records emitted after a per-group failure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub primary_driver: PrimaryDriver,
    pub metrics: Metrics,
    pub neighbors: Vec<Neighbor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryDriver {
    pub text: String,
    pub payment_score: u8,
    pub social_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub cycle: u32,
    pub repayment_rate: u8,
    /// `H+<whole days>`
    pub avg_delay: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    pub repayment_history: Vec<RatePoint>,
    pub asset_growth: Vec<ValuePoint>,
    pub stats: TrendStats,
    pub seasonality_heatmap: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub month: String,
    pub rate: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub month: String,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub streak: u32,
    pub last_default: String,
    pub trend_val: f64,
    pub trend_dir: String,
    pub avg_rate: f64,
    pub best_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub social_graph: SocialGraph,
    pub cv: VisualAssessment,
    pub prediction: Prediction,
    pub recommendation_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialGraph {
    pub risk_members: Vec<RiskMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMember {
    pub name: String,
    pub risk_score: String,
    pub hops: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAssessment {
    pub home: HomeAssessment,
    pub biz: BusinessAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeAssessment {
    pub condition: AssetCondition,
    pub material: String,
    pub roof: String,
    pub access: String,
    pub occupancy: String,
    pub assets: Vec<String>,
    pub img_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessAssessment {
    pub stability: String,
    #[serde(rename = "type")]
    pub business_type: String,
    pub traffic: String,
    pub status: String,
    pub digital: String,
    pub inventory: Vec<String>,
    pub img_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub default_risk_prob: u8,
    pub horizon_days: u32,
    pub what_if: WhatIf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIf {
    pub current_score: u8,
    pub projected_score: u8,
    pub improvement_pct: u8,
    pub scenario: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub last_audit: String,
    pub is_locked: bool,
    pub audit_date: String,
}

/// Inputs shared by full and placeholder assembly.
#[derive(Debug, Clone, Copy)]
pub struct GroupContext<'a> {
    pub aggregate: &'a GroupAggregate,
    pub band: RiskBand,
    pub image_url: &'a str,
    pub audit_date: NaiveDate,
}

/// Located loan if the batch has one, else the jittered base point.
pub fn resolve_coordinates(aggregate: &GroupAggregate, rng: &mut GroupRng) -> (f64, f64) {
    match aggregate.location {
        Some(hint) => (hint.lat, hint.lng),
        None => (
            BASE_LAT + rng.jitter(JITTER_HALF_WIDTH),
            BASE_LNG + rng.jitter(JITTER_HALF_WIDTH),
        ),
    }
}

/// Build the full record. Neighbors stay empty until wiring.
pub fn assemble(ctx: GroupContext<'_>, payload: &EnrichmentPayload, bank: &RngBank) -> Group {
    let agg = ctx.aggregate;
    let trust = payload.trust_score.min(100);
    let size = node_size(trust, ctx.band);

    let mut location_rng = bank.for_group(&agg.id, RngSlot::Location);
    let (lat, lng) = resolve_coordinates(agg, &mut location_rng);
    let city = NameGenerator::city(&mut location_rng).to_string();
    let village = NameGenerator::village(&mut location_rng).to_string();

    let mut layout = bank.for_group(&agg.id, RngSlot::Layout);
    let x = layout.range_inclusive(0, CANVAS_EXTENT);
    let y = layout.range_inclusive(0, CANVAS_EXTENT);
    let cycle = layout.range_inclusive(1, 10) as u32;
    let streak = layout.range_inclusive(1, 12) as u32;
    let last_audit = NameGenerator::field_agent(&mut layout);

    let mut trends_rng = bank.for_group(&agg.id, RngSlot::Trends);
    let repayment_history = trend_series(trust, false, &mut trends_rng)
        .into_iter()
        .zip(MONTHS)
        .map(|(rate, month)| RatePoint { month: month.to_string(), rate })
        .collect();
    let asset_growth = trend_series(trust, true, &mut trends_rng)
        .into_iter()
        .zip(MONTHS)
        .map(|(value, month)| ValuePoint { month: month.to_string(), value })
        .collect();

    let mut members_rng = bank.for_group(&agg.id, RngSlot::Members);
    let risk_members = sample_risk_members(ctx.band, &mut members_rng);

    Group {
        id: agg.id.clone(),
        risk: ctx.band,
        size,
        x,
        y,
        lat,
        lng,
        members: agg.members.clone(),
        header: Header {
            name: NameGenerator::group_name(agg.index + 1),
            location_city: city,
            location_village: village,
            member_count: agg.member_count(),
            risk_badge: payload.risk_badge.clone(),
            trust_score: trust,
            loan_eligibility: loan_eligibility(trust).to_string(),
            total_loan_amount: agg.total_outstanding as i64,
            visual_priority: visual_priority(ctx.band, size),
            placeholder: false,
        },
        overview: Overview {
            primary_driver: PrimaryDriver {
                text: payload.sentiment_text.clone(),
                payment_score: payload.repayment_prediction,
                social_score: trust,
            },
            metrics: Metrics {
                cycle,
                repayment_rate: payload.repayment_prediction,
                avg_delay: format!("H+{}", agg.avg_dpd as i64),
            },
            neighbors: Vec::new(),
        },
        trends: Trends {
            repayment_history,
            asset_growth,
            stats: TrendStats {
                streak,
                last_default: if agg.avg_dpd == 0.0 { "Never" } else { "Active" }.to_string(),
                trend_val: 2.5,
                trend_dir: if trust > ELIGIBILITY_THRESHOLD { "up" } else { "down" }.to_string(),
                avg_rate: 98.0,
                best_rate: 100.0,
            },
            seasonality_heatmap: SEASONALITY.to_vec(),
        },
        insights: Insights {
            social_graph: SocialGraph { risk_members },
            cv: assessment(&agg.business_type, payload, ctx.image_url),
            prediction: prediction(trust),
            recommendation_text: format!(
                "AI advice: {}",
                recommendation(trust, ctx.band, &agg.business_type, size)
            ),
        },
        decision: Decision {
            last_audit,
            is_locked: ctx.band == RiskBand::Toxic,
            audit_date: ctx.audit_date.format("%Y-%m-%d").to_string(),
        },
    }
}

/// Neutral record for a group whose processing failed. Uses no RNG
/// and no enrichment so it cannot fail the same way twice.
pub fn placeholder(ctx: GroupContext<'_>) -> Group {
    const NEUTRAL_TRUST: u8 = 50;
    let agg = ctx.aggregate;
    let size = node_size(NEUTRAL_TRUST, ctx.band);
    let (lat, lng) = agg
        .location
        .map(|h| (h.lat, h.lng))
        .unwrap_or((BASE_LAT, BASE_LNG));

    Group {
        id: agg.id.clone(),
        risk: ctx.band,
        size,
        x: CANVAS_EXTENT / 2,
        y: CANVAS_EXTENT / 2,
        lat,
        lng,
        members: agg.members.clone(),
        header: Header {
            name: format!("{} (PLACEHOLDER)", NameGenerator::group_name(agg.index + 1)),
            location_city: "Unknown".into(),
            location_village: "Unknown".into(),
            member_count: agg.member_count(),
            risk_badge: fallback::risk_badge(ctx.band).to_string(),
            trust_score: NEUTRAL_TRUST,
            loan_eligibility: loan_eligibility(NEUTRAL_TRUST).to_string(),
            total_loan_amount: agg.total_outstanding as i64,
            visual_priority: visual_priority(ctx.band, size),
            placeholder: true,
        },
        overview: Overview {
            primary_driver: PrimaryDriver {
                text: "Group data could not be processed; placeholder record.".into(),
                payment_score: NEUTRAL_TRUST,
                social_score: NEUTRAL_TRUST,
            },
            metrics: Metrics {
                cycle: 1,
                repayment_rate: NEUTRAL_TRUST,
                avg_delay: format!("H+{}", agg.avg_dpd as i64),
            },
            neighbors: Vec::new(),
        },
        trends: Trends {
            repayment_history: MONTHS
                .iter()
                .map(|m| RatePoint { month: m.to_string(), rate: NEUTRAL_TRUST })
                .collect(),
            asset_growth: MONTHS
                .iter()
                .map(|m| ValuePoint { month: m.to_string(), value: NEUTRAL_TRUST })
                .collect(),
            stats: TrendStats {
                streak: 0,
                last_default: "Unknown".into(),
                trend_val: 0.0,
                trend_dir: "flat".into(),
                avg_rate: 0.0,
                best_rate: 0.0,
            },
            seasonality_heatmap: SEASONALITY.to_vec(),
        },
        insights: Insights {
            social_graph: SocialGraph { risk_members: Vec::new() },
            cv: assessment(
                &agg.business_type,
                &EnrichmentPayload {
                    risk_badge: fallback::risk_badge(ctx.band).to_string(),
                    trust_score: NEUTRAL_TRUST,
                    sentiment_text: String::new(),
                    asset_condition: AssetCondition::Average,
                    asset_tags: Vec::new(),
                    repayment_prediction: NEUTRAL_TRUST,
                },
                ctx.image_url,
            ),
            prediction: prediction(NEUTRAL_TRUST),
            recommendation_text: "Manual review required: automated analysis failed for this group.".into(),
        },
        decision: Decision {
            last_audit: "Pending".into(),
            is_locked: true,
            audit_date: ctx.audit_date.format("%Y-%m-%d").to_string(),
        },
    }
}

pub fn loan_eligibility(trust: u8) -> &'static str {
    if trust > ELIGIBILITY_THRESHOLD { "Eligible" } else { "Review" }
}

/// Six monthly points walked backwards from the score, then reversed
/// into Jan..Jun order. High scorers drift down going back in time,
/// low scorers drift up.
pub fn trend_series(trust: u8, is_asset: bool, rng: &mut GroupRng) -> Vec<u8> {
    let score = i64::from(trust);
    let mut current = if is_asset { (score as f64 * 0.8) as i64 } else { score };
    let mut values = Vec::with_capacity(MONTHS.len());

    for _ in 0..MONTHS.len() {
        values.push(current.clamp(0, 100) as u8);
        let change = rng.range_inclusive(-5, 5);
        if score > 80 {
            current -= rng.range_inclusive(0, 3);
        } else if score < 50 {
            current += rng.range_inclusive(2, 8);
        }
        current = (current + change).clamp(10, 100);
    }
    values.reverse();
    values
}

fn sample_risk_members(band: RiskBand, rng: &mut GroupRng) -> Vec<RiskMember> {
    let count = rng.range_inclusive(3, 5);
    (0..count)
        .map(|_| {
            let score = match band {
                RiskBand::Healthy => rng.range_inclusive(10, 30),
                _ => rng.range_inclusive(40, 90),
            };
            RiskMember {
                name: NameGenerator::member_name(rng),
                risk_score: format!("{score}%"),
                hops: format!("{} hop", rng.range_inclusive(1, 2)),
                role: "Member".into(),
            }
        })
        .collect()
}

fn assessment(business_type: &str, payload: &EnrichmentPayload, image_url: &str) -> VisualAssessment {
    VisualAssessment {
        home: HomeAssessment {
            condition: payload.asset_condition,
            material: "Verified".into(),
            roof: "Tile".into(),
            access: "Paved".into(),
            occupancy: "Occupied".into(),
            assets: payload.asset_tags.clone(),
            img_url: image_url.to_string(),
        },
        biz: BusinessAssessment {
            stability: "Permanent".into(),
            business_type: business_type.to_string(),
            traffic: "Medium".into(),
            status: "Active".into(),
            digital: "QRIS".into(),
            inventory: vec!["Full".into()],
            img_url: image_url.to_string(),
        },
    }
}

fn prediction(trust: u8) -> Prediction {
    Prediction {
        default_risk_prob: 100 - trust.min(100),
        horizon_days: 30,
        what_if: WhatIf {
            current_score: trust,
            projected_score: trust.saturating_add(5).min(100),
            improvement_pct: 5,
            scenario: "Intervention".into(),
        },
    }
}

/// Capital recommendation keyed on band and visual size.
pub fn recommendation(trust: u8, band: RiskBand, business_type: &str, size: u32) -> String {
    match band {
        RiskBand::Healthy if size >= 40 => format!(
            "HIGH PRIORITY: {business_type} group qualifies for large capital. Trust score {trust}% is excellent."
        ),
        RiskBand::Healthy if size >= 30 => format!(
            "ELIGIBLE: {business_type} group can receive standard capital. Solid performance."
        ),
        RiskBand::Healthy => format!(
            "SMALL CAPITAL: {business_type} group qualifies for limited capital. Trust score {trust}% is fair."
        ),
        RiskBand::Medium if size >= 20 => format!(
            "DETAILED REVIEW: {business_type} group needs in-depth evaluation before any capital."
        ),
        RiskBand::Medium => format!(
            "MICRO CAPITAL: {business_type} group qualifies only for very limited capital under close monitoring."
        ),
        RiskBand::Toxic if size >= 30 => format!(
            "URGENT: {business_type} group at trust score {trust}% needs immediate intervention. Not eligible for capital."
        ),
        RiskBand::Toxic => format!(
            "NOT ELIGIBLE: {business_type} group is not recommended for capital. Focus on recovery first."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LocationHint;

    fn aggregate(avg_dpd: f64, location: Option<LocationHint>) -> GroupAggregate {
        GroupAggregate {
            index: 4,
            id: "G005".into(),
            members: vec!["C1".into(), "C2".into()],
            total_dpd: (avg_dpd * 2.0) as i64,
            avg_dpd,
            total_outstanding: 2_500_000.75,
            business_type: "Warung".into(),
            location,
        }
    }

    fn payload(trust: u8) -> EnrichmentPayload {
        EnrichmentPayload {
            risk_badge: "LOW RISK".into(),
            trust_score: trust,
            sentiment_text: "Steady payers.".into(),
            asset_condition: AssetCondition::Good,
            asset_tags: vec!["Kiosk".into()],
            repayment_prediction: 94,
        }
    }

    fn ctx(agg: &GroupAggregate, band: RiskBand) -> GroupContext<'_> {
        GroupContext {
            aggregate: agg,
            band,
            image_url: "data/images/a.jpg",
            audit_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    #[test]
    fn healthy_trust_92_assembles_to_size_43() {
        let agg = aggregate(0.0, None);
        let g = assemble(ctx(&agg, RiskBand::Healthy), &payload(92), &RngBank::new(1));
        assert_eq!(g.size, 43);
        assert_eq!(g.header.visual_priority, VisualPriority::High);
        assert_eq!(g.header.loan_eligibility, "Eligible");
        assert_eq!(g.header.name, NameGenerator::group_name(5));
        assert_eq!(g.header.total_loan_amount, 2_500_000);
        assert_eq!(g.overview.metrics.avg_delay, "H+0");
        assert_eq!(g.trends.stats.last_default, "Never");
        assert!(!g.decision.is_locked);
        assert_eq!(g.decision.audit_date, "2024-05-01");
        assert!(g.overview.neighbors.is_empty());
    }

    #[test]
    fn located_group_keeps_its_coordinates() {
        let agg = aggregate(0.0, Some(LocationHint { lat: -6.2, lng: 106.9 }));
        let g = assemble(ctx(&agg, RiskBand::Healthy), &payload(80), &RngBank::new(1));
        assert_eq!((g.lat, g.lng), (-6.2, 106.9));
    }

    #[test]
    fn unlocated_group_jitters_near_base() {
        let agg = aggregate(0.0, None);
        let g = assemble(ctx(&agg, RiskBand::Healthy), &payload(80), &RngBank::new(9));
        assert!((g.lat - BASE_LAT).abs() <= JITTER_HALF_WIDTH);
        assert!((g.lng - BASE_LNG).abs() <= JITTER_HALF_WIDTH);
    }

    #[test]
    fn toxic_groups_are_locked() {
        let agg = aggregate(45.0, None);
        let g = assemble(ctx(&agg, RiskBand::Toxic), &payload(20), &RngBank::new(1));
        assert!(g.decision.is_locked);
        assert_eq!(g.size, 40);
        assert_eq!(g.trends.stats.last_default, "Active");
        assert!(g.insights.recommendation_text.contains("URGENT"));
    }

    #[test]
    fn trend_series_has_six_bounded_points() {
        let mut rng = GroupRng::from_seed(5);
        for trust in [5u8, 45, 65, 95] {
            for is_asset in [false, true] {
                let series = trend_series(trust, is_asset, &mut rng);
                assert_eq!(series.len(), 6);
                assert!(series.iter().all(|v| *v <= 100));
            }
        }
    }

    #[test]
    fn trend_series_ends_on_the_score() {
        let mut rng = GroupRng::from_seed(5);
        assert_eq!(*trend_series(77, false, &mut rng).last().unwrap(), 77);
        assert_eq!(*trend_series(90, true, &mut rng).last().unwrap(), 72);
    }

    #[test]
    fn risk_members_follow_band() {
        let agg = aggregate(0.0, None);
        let g = assemble(ctx(&agg, RiskBand::Healthy), &payload(90), &RngBank::new(3));
        let members = &g.insights.social_graph.risk_members;
        assert!((3..=5).contains(&members.len()));
        for m in members {
            let pct: u32 = m.risk_score.trim_end_matches('%').parse().unwrap();
            assert!((10..=30).contains(&pct));
        }
    }

    #[test]
    fn placeholder_is_marked_and_in_range() {
        let agg = aggregate(45.0, None);
        let g = placeholder(ctx(&agg, RiskBand::Toxic));
        assert!(g.is_placeholder());
        assert!(g.header.name.ends_with("(PLACEHOLDER)"));
        assert_eq!(g.trust_score(), 50);
        assert_eq!(g.size, node_size(50, RiskBand::Toxic));
        assert_eq!(g.members, agg.members);
    }

    #[test]
    fn placeholder_flag_is_omitted_for_normal_groups() {
        let agg = aggregate(0.0, None);
        let g = assemble(ctx(&agg, RiskBand::Healthy), &payload(90), &RngBank::new(1));
        let json = serde_json::to_value(&g).unwrap();
        assert!(json["header"].get("placeholder").is_none());
        assert_eq!(json["type"], "healthy");
        assert_eq!(json["insights"]["cv"]["biz"]["type"], "Warung");
        assert_eq!(json["header"]["visual_priority"], "HIGH");
    }

    #[test]
    fn recommendation_matrix() {
        assert!(recommendation(95, RiskBand::Healthy, "X", 45).starts_with("HIGH PRIORITY"));
        assert!(recommendation(80, RiskBand::Healthy, "X", 33).starts_with("ELIGIBLE"));
        assert!(recommendation(72, RiskBand::Healthy, "X", 27).starts_with("SMALL CAPITAL"));
        assert!(recommendation(60, RiskBand::Medium, "X", 23).starts_with("DETAILED REVIEW"));
        assert!(recommendation(40, RiskBand::Medium, "X", 18).starts_with("MICRO CAPITAL"));
        assert!(recommendation(50, RiskBand::Toxic, "X", 25).starts_with("NOT ELIGIBLE"));
    }
}

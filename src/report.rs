use crate::model::{Metric, QuarterCode, QuarterRecord};
use serde::Serialize;
use std::collections::BTreeMap;

const EARLIER_OPACITY: f64 = 0.3;
const LATEST_OPACITY: f64 = 0.9;
const EARLIER_LINE_WIDTH: u8 = 1;
const LATEST_LINE_WIDTH: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub metric: &'static str,
    pub label: &'static str,
    pub values: Vec<u8>,
}

/// One closed polygon on the radar chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarTrace {
    pub quarter: QuarterCode,
    pub name: String,
    pub r: Vec<u8>,
    pub theta: Vec<&'static str>,
    pub emphasized: bool,
    pub opacity: f64,
    pub line_width: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionReport {
    pub quarters: Vec<QuarterCode>,
    pub series: Vec<MetricSeries>,
    pub radar: Vec<RadarTrace>,
    pub axis_range: [u8; 2],
}

impl EvolutionReport {
    /// Projects a quarters map into chart series. `None` when there is nothing
    /// to chart.
    pub fn project(quarters: &BTreeMap<QuarterCode, QuarterRecord>) -> Option<EvolutionReport> {
        if quarters.is_empty() {
            return None;
        }
        // BTreeMap iteration already follows QuarterCode ordering.
        let ordered: Vec<(&QuarterCode, &QuarterRecord)> = quarters.iter().collect();
        let last = ordered.len() - 1;

        let series = Metric::ALL
            .iter()
            .map(|m| MetricSeries {
                metric: m.field(),
                label: m.label(),
                values: ordered.iter().map(|(_, q)| q.scores.get(*m).get()).collect(),
            })
            .collect();

        let mut theta: Vec<&'static str> = Metric::ALL.iter().map(|m| m.label()).collect();
        theta.push(Metric::ALL[0].label());

        let radar = ordered
            .iter()
            .enumerate()
            .map(|(i, (code, q))| {
                let mut r: Vec<u8> = q.scores.iter().map(|(_, s)| s.get()).collect();
                r.push(q.scores.get(Metric::ALL[0]).get());
                let latest = i == last;
                RadarTrace {
                    quarter: (*code).clone(),
                    name: if latest {
                        format!("{} (latest)", code)
                    } else {
                        code.to_string()
                    },
                    r,
                    theta: theta.clone(),
                    emphasized: latest,
                    opacity: if latest { LATEST_OPACITY } else { EARLIER_OPACITY },
                    line_width: if latest {
                        LATEST_LINE_WIDTH
                    } else {
                        EARLIER_LINE_WIDTH
                    },
                }
            })
            .collect();

        Some(EvolutionReport {
            quarters: ordered.iter().map(|(c, _)| (*c).clone()).collect(),
            series,
            radar,
            axis_range: [0, 10],
        })
    }
}

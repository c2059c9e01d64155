//! Single-pass grouping of a time-ordered stream into stays.
//!
//! [`cluster`] owns the accumulator and the span bookkeeping (start, end,
//! member count). A [`StayPolicy`] decides whether the next item extends the
//! open cluster, folds it in, and turns a closed cluster into an output record
//! or drops it as insignificant.

use serde::Serialize;
use utoipa::ToSchema;

use crate::geo::{haversine_m, round6};
use crate::points::Position;

/// Time bounds and size of a closed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_ts: i64,
    /// Timestamp of the last member, not of the item that closed the cluster
    pub end_ts: i64,
    pub count: usize,
}

impl Span {
    /// Saturates instead of overflowing on unscreened extremes.
    pub fn duration_sec(&self) -> i64 {
        self.end_ts.saturating_sub(self.start_ts)
    }
}

pub trait StayPolicy {
    type Item;
    /// Policy-specific state carried by the open cluster
    type Acc;
    type Output;

    fn timestamp(&self, item: &Self::Item) -> i64;

    fn open(&self, item: &Self::Item) -> Self::Acc;

    fn continues(&self, acc: &Self::Acc, item: &Self::Item) -> bool;

    fn absorb(&self, acc: &mut Self::Acc, item: &Self::Item);

    /// `None` drops the cluster.
    fn close(&self, acc: Self::Acc, span: Span) -> Option<Self::Output>;
}

pub fn cluster<P: StayPolicy>(policy: &P, items: &[P::Item]) -> Vec<P::Output> {
    let mut out = Vec::new();
    let mut open: Option<(P::Acc, Span)> = None;

    for item in items {
        let ts = policy.timestamp(item);
        if let Some((acc, span)) = open.as_mut()
            && policy.continues(acc, item)
        {
            policy.absorb(acc, item);
            span.end_ts = ts;
            span.count += 1;
            continue;
        }

        if let Some((acc, span)) = open.take() {
            out.extend(policy.close(acc, span));
        }
        open = Some((
            policy.open(item),
            Span {
                start_ts: ts,
                end_ts: ts,
                count: 1,
            },
        ));
    }

    if let Some((acc, span)) = open {
        out.extend(policy.close(acc, span));
    }
    out
}

/// A position after geocoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPosition {
    pub timestamp: i64,
    pub code: Option<String>,
    pub address: Option<String>,
}

/// Maximal run of consecutive positions sharing a resolved code.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Stay {
    pub start_ts: i64,
    pub end_ts: i64,
    pub code: Option<String>,
    pub address: Option<String>,
    pub duration_sec: i64,
    pub count: usize,
}

/// Run of positions that stayed within a distance threshold of each other.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DwellStay {
    pub start_ts: i64,
    pub end_ts: i64,
    /// Centroid latitude, 6 decimal places
    pub lat: f64,
    /// Centroid longitude, 6 decimal places
    pub lon: f64,
    pub duration_sec: i64,
    pub count: usize,
}

/// Either flavour of stay, as returned by `summarize_stays`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum StaySummary {
    Code(Stay),
    Dwell(DwellStay),
}

/// Groups by code equality. No-coverage points (`code == None`) form runs of
/// their own, so they always close a covered cluster. Every run is emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeRunPolicy;

impl StayPolicy for CodeRunPolicy {
    type Item = ResolvedPosition;
    type Acc = (Option<String>, Option<String>);
    type Output = Stay;

    fn timestamp(&self, item: &ResolvedPosition) -> i64 {
        item.timestamp
    }

    fn open(&self, item: &ResolvedPosition) -> Self::Acc {
        // address is meaningless without a code
        let address = item.code.as_ref().and(item.address.clone());
        (item.code.clone(), address)
    }

    fn continues(&self, (code, _): &Self::Acc, item: &ResolvedPosition) -> bool {
        *code == item.code
    }

    fn absorb(&self, _acc: &mut Self::Acc, _item: &ResolvedPosition) {}

    fn close(&self, (code, address): Self::Acc, span: Span) -> Option<Stay> {
        Some(Stay {
            start_ts: span.start_ts,
            end_ts: span.end_ts,
            code,
            address,
            duration_sec: span.duration_sec(),
            count: span.count,
        })
    }
}

/// Groups by proximity to the previous member and keeps only clusters with at
/// least two members lasting at least `min_duration_sec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellPolicy {
    pub max_distance_m: f64,
    pub min_duration_sec: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DwellAcc {
    last_lat: f64,
    last_lon: f64,
    sum_lat: f64,
    sum_lon: f64,
}

impl StayPolicy for DwellPolicy {
    type Item = Position;
    type Acc = DwellAcc;
    type Output = DwellStay;

    fn timestamp(&self, item: &Position) -> i64 {
        item.timestamp
    }

    fn open(&self, item: &Position) -> DwellAcc {
        DwellAcc {
            last_lat: item.lat,
            last_lon: item.lon,
            sum_lat: item.lat,
            sum_lon: item.lon,
        }
    }

    fn continues(&self, acc: &DwellAcc, item: &Position) -> bool {
        haversine_m(acc.last_lat, acc.last_lon, item.lat, item.lon) <= self.max_distance_m
    }

    fn absorb(&self, acc: &mut DwellAcc, item: &Position) {
        acc.last_lat = item.lat;
        acc.last_lon = item.lon;
        acc.sum_lat += item.lat;
        acc.sum_lon += item.lon;
    }

    fn close(&self, acc: DwellAcc, span: Span) -> Option<DwellStay> {
        if span.count < 2 || span.duration_sec() < self.min_duration_sec {
            return None;
        }
        let n = span.count as f64;
        Some(DwellStay {
            start_ts: span.start_ts,
            end_ts: span.end_ts,
            lat: round6(acc.sum_lat / n),
            lon: round6(acc.sum_lon / n),
            duration_sec: span.duration_sec(),
            count: span.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(timestamp: i64, code: Option<&str>) -> ResolvedPosition {
        ResolvedPosition {
            timestamp,
            code: code.map(str::to_string),
            address: code.map(|c| format!("addr-{c}")),
        }
    }

    fn position(index: usize, timestamp: i64, lat: f64, lon: f64) -> Position {
        Position {
            index,
            timestamp,
            lat,
            lon,
        }
    }

    #[test]
    fn two_code_runs_end_at_last_member() {
        let items = vec![
            resolved(0, Some("A")),
            resolved(60, Some("A")),
            resolved(120, Some("B")),
            resolved(180, Some("B")),
        ];
        let stays = cluster(&CodeRunPolicy, &items);

        assert_eq!(
            stays,
            vec![
                Stay {
                    start_ts: 0,
                    end_ts: 60,
                    code: Some("A".into()),
                    address: Some("addr-A".into()),
                    duration_sec: 60,
                    count: 2,
                },
                Stay {
                    start_ts: 120,
                    end_ts: 180,
                    code: Some("B".into()),
                    address: Some("addr-B".into()),
                    duration_sec: 60,
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn singletons_are_emitted_with_zero_duration() {
        let items = vec![resolved(10, Some("A"))];
        let stays = cluster(&CodeRunPolicy, &items);
        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].duration_sec, 0);
        assert_eq!(stays[0].count, 1);
    }

    #[test]
    fn uncovered_points_split_covered_runs() {
        let items = vec![
            resolved(0, Some("A")),
            resolved(10, None),
            resolved(20, None),
            resolved(30, Some("A")),
        ];
        let stays = cluster(&CodeRunPolicy, &items);

        let codes: Vec<_> = stays.iter().map(|s| s.code.as_deref()).collect();
        assert_eq!(codes, vec![Some("A"), None, Some("A")]);
        assert_eq!(stays[1].count, 2);
        assert_eq!(stays[1].address, None);
        assert_eq!((stays[1].start_ts, stays[1].end_ts), (10, 20));
    }

    #[test]
    fn address_is_fixed_when_cluster_opens() {
        let mut second = resolved(60, Some("A"));
        second.address = Some("other".into());
        let stays = cluster(&CodeRunPolicy, &[resolved(0, Some("A")), second]);
        assert_eq!(stays[0].address.as_deref(), Some("addr-A"));
    }

    #[test]
    fn counts_add_up_and_adjacent_codes_differ() {
        let pattern = ["A", "A", "B", "A", "C", "C", "C", "B", "B", "A"];
        let items: Vec<_> = pattern
            .iter()
            .enumerate()
            .map(|(i, c)| resolved(i as i64 * 30, Some(c)))
            .collect();
        let stays = cluster(&CodeRunPolicy, &items);

        assert_eq!(stays.iter().map(|s| s.count).sum::<usize>(), items.len());
        assert!(stays.windows(2).all(|w| w[0].code != w[1].code));
        assert_eq!(stays.len(), 6);
    }

    #[test]
    fn empty_input_yields_no_stays() {
        assert!(cluster(&CodeRunPolicy, &[]).is_empty());
    }

    #[test]
    fn dwell_policy_groups_nearby_positions() {
        let policy = DwellPolicy {
            max_distance_m: 100.0,
            min_duration_sec: 60,
        };
        let items = vec![
            position(0, 0, 35.0, 135.0),
            position(1, 60, 35.0, 135.0005),
            position(2, 120, 35.0, 135.0),
            position(3, 5000, 35.1, 135.1),
            position(4, 5120, 35.1002, 135.1002),
        ];
        let stays = cluster(&policy, &items);

        assert_eq!(stays.len(), 2);
        assert_eq!((stays[0].start_ts, stays[0].end_ts, stays[0].count), (0, 120, 3));
        assert_eq!(stays[0].lat, 35.0);
        assert_eq!(stays[0].lon, 135.000167);
        assert_eq!((stays[1].start_ts, stays[1].end_ts, stays[1].count), (5000, 5120, 2));
        assert_eq!(stays[1].duration_sec, 120);
        assert_eq!(stays[1].lat, 35.1001);
    }

    #[test]
    fn dwell_policy_drops_short_and_single_member_clusters() {
        let policy = DwellPolicy {
            max_distance_m: 50.0,
            min_duration_sec: 120,
        };
        let items = vec![
            // two members but only 60 s
            position(0, 0, 10.0, 10.0),
            position(1, 60, 10.0, 10.0),
            // a lone ping far away
            position(2, 600, 11.0, 11.0),
            // long enough
            position(3, 1200, 12.0, 12.0),
            position(4, 1400, 12.0, 12.0),
        ];
        let stays = cluster(&policy, &items);
        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].start_ts, 1200);
        assert_eq!(stays[0].count, 2);
    }

    #[test]
    fn dwell_distance_is_measured_from_last_member() {
        // each hop is ~45 m, the whole chain spans ~135 m
        let policy = DwellPolicy {
            max_distance_m: 50.0,
            min_duration_sec: 0,
        };
        let items: Vec<_> = (0..4)
            .map(|i| position(i, i as i64 * 10, 35.0, 135.0 + 0.0005 * i as f64))
            .collect();
        let stays = cluster(&policy, &items);
        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].count, 4);
    }

    #[test]
    fn summaries_serialize_without_tag() {
        let stay = StaySummary::Dwell(DwellStay {
            start_ts: 0,
            end_ts: 60,
            lat: 1.5,
            lon: 2.5,
            duration_sec: 60,
            count: 2,
        });
        let value = serde_json::to_value(&stay).unwrap();
        assert_eq!(value["lat"], 1.5);
        assert!(value.get("Dwell").is_none());

        let stay = StaySummary::Code(Stay {
            start_ts: 0,
            end_ts: 0,
            code: None,
            address: None,
            duration_sec: 0,
            count: 1,
        });
        let value = serde_json::to_value(&stay).unwrap();
        assert!(value["code"].is_null());
    }

    #[test]
    fn widest_accepted_timestamps_fit_both_policies() {
        use crate::validate::MAX_ABS_TIMESTAMP;

        let runs = cluster(
            &CodeRunPolicy,
            &[
                resolved(-MAX_ABS_TIMESTAMP, Some("A")),
                resolved(MAX_ABS_TIMESTAMP, Some("A")),
            ],
        );
        assert_eq!(runs[0].duration_sec, 2 * MAX_ABS_TIMESTAMP);

        let policy = DwellPolicy {
            max_distance_m: 100.0,
            min_duration_sec: 0,
        };
        let dwell = cluster(
            &policy,
            &[
                position(0, -MAX_ABS_TIMESTAMP, 35.0, 135.0),
                position(1, MAX_ABS_TIMESTAMP, 35.0, 135.0),
            ],
        );
        assert_eq!(dwell[0].duration_sec, 2 * MAX_ABS_TIMESTAMP);
    }

    #[test]
    fn full_range_span_saturates() {
        let span = Span {
            start_ts: i64::MIN,
            end_ts: i64::MAX,
            count: 2,
        };
        assert_eq!(span.duration_sec(), i64::MAX);

        let policy = DwellPolicy {
            max_distance_m: 100.0,
            min_duration_sec: 0,
        };
        let dwell = cluster(
            &policy,
            &[
                position(0, -9_000_000_000_000_000_000, 35.0, 135.0),
                position(1, 9_000_000_000_000_000_000, 35.0, 135.0),
            ],
        );
        assert_eq!(dwell[0].duration_sec, i64::MAX);
        assert!(dwell[0].duration_sec >= 0);
    }
}

use galuchat_core::error::{ErrorCode, InvalidInput};
use galuchat_core::points::{GeocodeResult, Granularity, PointRef, RejectedPoint};
use galuchat_core::stays::{
    CodeRunPolicy, DwellPolicy, ResolvedPosition, StaySummary, cluster,
};
use galuchat_core::validate::{
    validate_points, validate_points_strict, validate_positions, validate_positions_strict,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::ToolLimits;
use crate::resolver::{GaluchatClient, ResolveError};

/// Default proximity for dwell clustering when only a duration is given.
pub const DEFAULT_DISTANCE_THRESHOLD_M: f64 = 100.0;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolvePointsArgs {
    /// admin | estat | jarl; anything else means admin
    #[serde(default)]
    pub granularity: Option<String>,
    /// Raw point objects `{ref?, lat, lon, t?}`; screened item by item
    #[schema(value_type = Vec<Object>)]
    pub points: Vec<Value>,
    /// Abort on the first invalid point instead of reporting it inline
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SummarizeStaysArgs {
    /// Raw position objects `{timestamp, lat, lon}` in time order
    #[schema(value_type = Vec<Object>)]
    pub positions: Vec<Value>,
    #[serde(default)]
    pub params: Option<StayParams>,
    #[serde(default)]
    pub strict: bool,
}

/// Setting either threshold switches from code runs to dwell clustering.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct StayParams {
    pub distance_threshold_m: Option<f64>,
    pub duration_threshold_sec: Option<i64>,
}

impl StayParams {
    fn dwell_policy(self) -> Result<Option<DwellPolicy>, InvalidInput> {
        if self.distance_threshold_m.is_none() && self.duration_threshold_sec.is_none() {
            return Ok(None);
        }
        let max_distance_m = self
            .distance_threshold_m
            .unwrap_or(DEFAULT_DISTANCE_THRESHOLD_M);
        if !max_distance_m.is_finite() || max_distance_m < 0.0 {
            return Err(InvalidInput::request(
                "distance_threshold_m must be a non-negative number",
                "params.distance_threshold_m",
            ));
        }
        let min_duration_sec = self.duration_threshold_sec.unwrap_or(0);
        if min_duration_sec < 0 {
            return Err(InvalidInput::request(
                "duration_threshold_sec must not be negative",
                "params.duration_threshold_sec",
            ));
        }
        Ok(Some(DwellPolicy {
            max_distance_m,
            min_duration_sec,
        }))
    }
}

/// One slot per input point, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PointResult {
    pub index: usize,
    #[serde(rename = "ref", skip_serializing_if = "PointRef::is_absent")]
    #[schema(value_type = Option<Value>)]
    pub point_ref: PointRef,
    /// `null` for rejected points; `{code: null, address: null}` when uncovered
    pub payload: Option<GeocodeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvePointsOutput {
    pub granularity: Granularity,
    pub results: Vec<PointResult>,
    /// Rejected and uncovered points, by index
    pub errors: Vec<RejectedPoint>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SummarizeStaysOutput {
    /// Stays in time order
    pub results: Vec<StaySummary>,
    pub errors: Vec<RejectedPoint>,
}

/// Batch-level failure of a tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ToolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::InvalidInput(_) => ErrorCode::InvalidInput,
            ToolError::Resolve(err) => err.code(),
        }
    }

    pub fn location(&self) -> Option<Value> {
        match self {
            ToolError::InvalidInput(err) => Some(err.location()),
            ToolError::Resolve(_) => None,
        }
    }
}

/// Runs validation, resolution and clustering for each tool call.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    client: GaluchatClient,
    limits: ToolLimits,
}

impl ToolDispatcher {
    pub fn new(client: GaluchatClient, limits: ToolLimits) -> Self {
        Self { client, limits }
    }

    pub fn limits(&self) -> ToolLimits {
        self.limits
    }

    pub async fn resolve_points(
        &self,
        args: ResolvePointsArgs,
    ) -> Result<ResolvePointsOutput, ToolError> {
        self.check_batch_size(args.points.len(), "points")?;
        let granularity = Granularity::parse_lenient(args.granularity.as_deref());

        let (valid, rejected) = if args.strict {
            (validate_points_strict(&args.points)?, Vec::new())
        } else {
            validate_points(&args.points)
        };

        let coords: Vec<(f64, f64)> = valid.iter().map(|p| (p.lat, p.lon)).collect();
        let resolved = self.client.resolve(granularity, &coords).await?;

        let mut slots: Vec<Option<PointResult>> = vec![None; args.points.len()];
        let mut errors = Vec::new();

        for point in rejected {
            slots[point.index] = Some(PointResult {
                index: point.index,
                point_ref: point.point_ref.clone(),
                payload: None,
                reason: Some(point.reason),
            });
            errors.push(point);
        }

        for (point, result) in valid.into_iter().zip(resolved) {
            let reason = if result.is_covered() {
                None
            } else {
                errors.push(uncovered(&args.points, point.index, point.point_ref.clone()));
                Some(ErrorCode::OutOfCoverage)
            };
            slots[point.index] = Some(PointResult {
                index: point.index,
                point_ref: point.point_ref,
                payload: Some(result),
                reason,
            });
        }

        errors.sort_by_key(|e| e.index);
        let results: Vec<PointResult> = slots.into_iter().flatten().collect();

        tracing::info!(
            event = "resolve_points",
            granularity = granularity.as_str(),
            points = results.len(),
            errors = errors.len(),
            "Resolved points"
        );

        Ok(ResolvePointsOutput {
            granularity,
            results,
            errors,
        })
    }

    pub async fn summarize_stays(
        &self,
        args: SummarizeStaysArgs,
    ) -> Result<SummarizeStaysOutput, ToolError> {
        self.check_batch_size(args.positions.len(), "positions")?;
        let dwell = args.params.unwrap_or_default().dwell_policy()?;

        let (valid, errors) = if args.strict {
            (validate_positions_strict(&args.positions)?, Vec::new())
        } else {
            validate_positions(&args.positions)
        };

        let results: Vec<StaySummary> = match dwell {
            Some(policy) => cluster(&policy, &valid)
                .into_iter()
                .map(StaySummary::Dwell)
                .collect(),
            None => {
                let coords: Vec<(f64, f64)> = valid.iter().map(|p| (p.lat, p.lon)).collect();
                let resolved = self.client.resolve(Granularity::Admin, &coords).await?;
                let stream: Vec<ResolvedPosition> = valid
                    .iter()
                    .zip(resolved)
                    .map(|(position, result)| ResolvedPosition {
                        timestamp: position.timestamp,
                        code: result.code,
                        address: result.address,
                    })
                    .collect();
                cluster(&CodeRunPolicy, &stream)
                    .into_iter()
                    .map(StaySummary::Code)
                    .collect()
            }
        };

        tracing::info!(
            event = "summarize_stays",
            mode = if dwell.is_some() { "dwell" } else { "code_run" },
            positions = args.positions.len(),
            stays = results.len(),
            errors = errors.len(),
            "Summarized stays"
        );

        Ok(SummarizeStaysOutput { results, errors })
    }

    fn check_batch_size(&self, len: usize, field: &str) -> Result<(), InvalidInput> {
        if len > self.limits.max_points {
            return Err(InvalidInput::request(
                format!(
                    "{field} holds {len} items; at most {} are accepted per call",
                    self.limits.max_points
                ),
                field,
            ));
        }
        Ok(())
    }
}

fn uncovered(raw: &[Value], index: usize, point_ref: PointRef) -> RejectedPoint {
    let field = |key: &str| {
        raw.get(index)
            .and_then(|item| item.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };
    RejectedPoint {
        index,
        point_ref,
        lat: field("lat"),
        lon: field("lon"),
        timestamp: None,
        reason: ErrorCode::OutOfCoverage,
    }
}

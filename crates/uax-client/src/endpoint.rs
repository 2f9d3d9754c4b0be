// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint selection.
//!
//! A server advertises several endpoints for the same address, one per
//! security mode/policy pair. Selection is a pure function of the advertised
//! list and an [`EndpointPolicy`]; it keeps no state between calls.
//!
//! ```text
//! [level 3, level 1, level 2] ──stable sort──► [1, 2, 3] ──first──► level 1
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::EndpointDescription;
use crate::error::{OpcUaError, OpcUaResult};
use crate::types::{SecurityMode, SecurityPolicy};

// =============================================================================
// EndpointPolicy
// =============================================================================

/// How an endpoint is chosen from a discovered list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EndpointPolicy {
    /// Lowest advertised security level.
    #[default]
    LowestSecurity,

    /// Highest advertised security level.
    HighestSecurity,

    /// First endpoint with exactly this mode and policy.
    Matching {
        /// Required security mode.
        mode: SecurityMode,
        /// Required security policy.
        policy: SecurityPolicy,
    },
}

// =============================================================================
// Selection
// =============================================================================

/// Selects an endpoint under `policy`.
///
/// Ties keep the server's advertised order.
///
/// # Errors
///
/// `ConnectionError::NoSuitableEndpoint` when the list is empty or nothing
/// matches.
pub fn select_endpoint(
    endpoints: &[EndpointDescription],
    policy: &EndpointPolicy,
) -> OpcUaResult<EndpointDescription> {
    if endpoints.is_empty() {
        return Err(OpcUaError::no_endpoint("server returned no endpoints"));
    }

    let mut sorted: Vec<&EndpointDescription> = endpoints.iter().collect();
    sorted.sort_by_key(|e| e.security_level);

    let chosen = match policy {
        EndpointPolicy::LowestSecurity => sorted.first().copied(),
        EndpointPolicy::HighestSecurity => {
            let highest = sorted.last().map(|e| e.security_level);
            sorted
                .iter()
                .copied()
                .find(|e| Some(e.security_level) == highest)
        }
        EndpointPolicy::Matching { mode, policy } => sorted.iter().copied().find(|e| {
            e.security_mode == *mode
                && SecurityPolicy::from_uri(&e.security_policy_uri).as_ref() == Some(policy)
        }),
    };

    let chosen = chosen.ok_or_else(|| {
        OpcUaError::no_endpoint(format!("no endpoint matches policy {:?}", policy))
    })?;

    debug!(endpoint = %chosen, ?policy, "Selected endpoint");
    Ok(chosen.clone())
}

/// Rewrites the endpoint URL to the one the user asked for.
///
/// Some servers advertise a hostname or port that is unreachable from the
/// client; the requested URL is the one known to work.
pub fn normalize_endpoint_url(
    mut endpoint: EndpointDescription,
    requested_url: &str,
) -> EndpointDescription {
    if endpoint.endpoint_url != requested_url {
        warn!(
            advertised = %endpoint.endpoint_url,
            requested = %requested_url,
            "Endpoint URL mismatch, using requested URL"
        );
        endpoint.endpoint_url = requested_url.to_string();
    }
    endpoint
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(level: u8, mode: SecurityMode, policy: SecurityPolicy) -> EndpointDescription {
        EndpointDescription::new(
            format!("opc.tcp://host:4840/{}", level),
            mode,
            policy.uri(),
            level,
        )
    }

    fn lowest(endpoints: &[EndpointDescription]) -> OpcUaResult<EndpointDescription> {
        select_endpoint(endpoints, &EndpointPolicy::LowestSecurity)
    }

    fn sample() -> Vec<EndpointDescription> {
        vec![
            endpoint(3, SecurityMode::SignAndEncrypt, SecurityPolicy::Basic256Sha256),
            endpoint(1, SecurityMode::None, SecurityPolicy::None),
            endpoint(2, SecurityMode::Sign, SecurityPolicy::Basic256Sha256),
        ]
    }

    #[test]
    fn test_lowest_security_wins() {
        let chosen = lowest(&sample()).unwrap();
        assert_eq!(chosen.security_level, 1);
    }

    #[test]
    fn test_ties_keep_advertised_order() {
        let mut endpoints = sample();
        endpoints.push(EndpointDescription::new(
            "opc.tcp://other:4840",
            SecurityMode::None,
            SecurityPolicy::None.uri(),
            1,
        ));
        let chosen = lowest(&endpoints).unwrap();
        assert_eq!(chosen.endpoint_url, "opc.tcp://host:4840/1");
    }

    #[test]
    fn test_highest_security() {
        let chosen = select_endpoint(&sample(), &EndpointPolicy::HighestSecurity).unwrap();
        assert_eq!(chosen.security_level, 3);
    }

    #[test]
    fn test_matching_policy() {
        let policy = EndpointPolicy::Matching {
            mode: SecurityMode::Sign,
            policy: SecurityPolicy::Basic256Sha256,
        };
        let chosen = select_endpoint(&sample(), &policy).unwrap();
        assert_eq!(chosen.security_level, 2);

        let missing = EndpointPolicy::Matching {
            mode: SecurityMode::Sign,
            policy: SecurityPolicy::Aes256Sha256RsaPss,
        };
        let err = select_endpoint(&sample(), &missing).unwrap_err();
        assert_eq!(err.category(), "connection");
    }

    #[test]
    fn test_empty_list_fails() {
        let err = lowest(&[]).unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Connection(crate::error::ConnectionError::NoSuitableEndpoint { .. })
        ));
    }

    #[test]
    fn test_normalize_endpoint_url() {
        let advertised = endpoint(1, SecurityMode::None, SecurityPolicy::None);
        let fixed = normalize_endpoint_url(advertised.clone(), "opc.tcp://10.0.0.5:4840");
        assert_eq!(fixed.endpoint_url, "opc.tcp://10.0.0.5:4840");
        assert_eq!(fixed.security_level, advertised.security_level);

        let same = normalize_endpoint_url(advertised.clone(), &advertised.endpoint_url);
        assert_eq!(same, advertised);
    }

    #[test]
    fn test_policy_serde() {
        let json = r#"{"kind":"matching","mode":"sign","policy":"basic256_sha256"}"#;
        let policy: EndpointPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(
            policy,
            EndpointPolicy::Matching {
                mode: SecurityMode::Sign,
                policy: SecurityPolicy::Basic256Sha256
            }
        );
        let default: EndpointPolicy =
            serde_json::from_str(r#"{"kind":"lowest_security"}"#).unwrap();
        assert_eq!(default, EndpointPolicy::LowestSecurity);
    }
}

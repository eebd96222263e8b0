//! Automatic linking of diagram calls to API contracts.

use super::diagram_parser::{DiagramParser, ParsedCall};
use super::endpoint_matcher::EndpointMatcher;
use crate::error::EngineError;
use crate::models::{ApiContract, ApiSequenceLink};
use crate::storage::{StorageBackend, StorageError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A contract paired with its compiled path matcher.
pub struct CompiledContract<'a> {
    pub contract: &'a ApiContract,
    pub matcher: EndpointMatcher,
}

/// Compile matchers for every contract; contracts with unusable templates are skipped.
pub fn compile_contracts(contracts: &[ApiContract]) -> Vec<CompiledContract<'_>> {
    contracts
        .iter()
        .filter_map(|contract| match EndpointMatcher::compile(&contract.endpoint) {
            Ok(matcher) => Some(CompiledContract { contract, matcher }),
            Err(e) => {
                warn!("Skipping contract {}: {}", contract.code, e);
                None
            }
        })
        .collect()
}

/// First contract whose method equals the call's and whose template accepts its path.
pub fn match_call<'a>(
    call: &ParsedCall,
    compiled: &'a [CompiledContract<'a>],
) -> Option<&'a ApiContract> {
    let (Some(method), Some(path)) = (call.method, call.path.as_deref()) else {
        return None;
    };
    compiled
        .iter()
        .find(|c| c.contract.method == method && c.matcher.test(path))
        .map(|c| c.contract)
}

/// Links that auto-detection would create for the given calls, in call order.
pub fn propose_links(
    sequence_id: Uuid,
    calls: &[ParsedCall],
    contracts: &[ApiContract],
) -> Vec<ApiSequenceLink> {
    let compiled = compile_contracts(contracts);
    calls
        .iter()
        .filter_map(|call| {
            match_call(call, &compiled).map(|contract| {
                ApiSequenceLink::new(contract.id, sequence_id)
                    .at_step(call.raw_line.clone(), call.line_number)
            })
        })
        .collect()
}

/// Discovers and persists links between a diagram's calls and the project's contracts.
#[derive(Clone)]
pub struct LinkResolver {
    storage: Arc<dyn StorageBackend>,
    parser: DiagramParser,
}

impl LinkResolver {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            parser: DiagramParser::new(),
        }
    }

    /// Parse the diagram's stored source and link every call matching a contract.
    ///
    /// Returns the links created by this run. Links that already exist are skipped,
    /// so re-running on unchanged data returns an empty list. Calls with no
    /// matching contract stay unlinked.
    pub async fn auto_detect(&self, sequence_id: Uuid) -> Result<Vec<ApiSequenceLink>, EngineError> {
        let diagram = self
            .storage
            .get_sequence_diagram(sequence_id)
            .await?
            .ok_or_else(|| StorageError::not_found("sequence_diagram", sequence_id))?;

        let parsed = self.parser.parse(&diagram.source);
        let contracts = self.storage.list_api_contracts(diagram.project_id).await?;
        let proposed = propose_links(sequence_id, &parsed.api_calls, &contracts);

        let mut created = Vec::with_capacity(proposed.len());
        for link in proposed {
            match self.storage.create_api_sequence_link(link).await {
                Ok(link) => created.push(link),
                Err(StorageError::Duplicate { key, .. }) => {
                    debug!("Link {} already exists, skipping", key);
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            "Auto-detected {} new API links for diagram {} ({} calls)",
            created.len(),
            diagram.code,
            parsed.api_calls.len()
        );
        Ok(created)
    }
}

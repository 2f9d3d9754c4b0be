// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Attribute reads and writes.
//!
//! The attributes read for a node are fixed by its [`NodeClass`]; see
//! [`attributes_for_class`]. Writes expect a value already in the node's wire
//! type, except [`AttributeAccess::write_from_string`] which runs the text
//! through the value codec first.
//!
//! Names of non-builtin data types are looked up once per session and
//! memoized.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::client::session::SessionManager;
use crate::client::transport::{AttributeValue, ReadValueId, Variant, WriteValue};
use crate::codec::{self, ACCESS_CURRENT_WRITE};
use crate::error::{ConversionError, OpcUaError, OpcUaResult, OperationError};
use crate::tree::NodeRef;
use crate::types::{AttributeId, NodeClass, NodeId, OpcUaDataType, ServerState, StatusCode};

// =============================================================================
// Per-class attribute table
// =============================================================================

const COMMON: [AttributeId; 7] = [
    AttributeId::NodeId,
    AttributeId::NodeClass,
    AttributeId::BrowseName,
    AttributeId::DisplayName,
    AttributeId::Description,
    AttributeId::WriteMask,
    AttributeId::UserWriteMask,
];

/// Returns the attributes read for a node of `class`, common ones first.
pub fn attributes_for_class(class: NodeClass) -> Vec<AttributeId> {
    let specific: &[AttributeId] = match class {
        NodeClass::Object => &[AttributeId::EventNotifier],
        NodeClass::Variable => &[
            AttributeId::Value,
            AttributeId::DataType,
            AttributeId::ValueRank,
            AttributeId::ArrayDimensions,
            AttributeId::AccessLevel,
            AttributeId::UserAccessLevel,
            AttributeId::MinimumSamplingInterval,
            AttributeId::Historizing,
        ],
        NodeClass::Method => &[AttributeId::Executable, AttributeId::UserExecutable],
        NodeClass::ObjectType => &[AttributeId::IsAbstract],
        NodeClass::VariableType => &[
            AttributeId::Value,
            AttributeId::DataType,
            AttributeId::ValueRank,
            AttributeId::ArrayDimensions,
            AttributeId::IsAbstract,
        ],
        NodeClass::ReferenceType => &[
            AttributeId::IsAbstract,
            AttributeId::Symmetric,
            AttributeId::InverseName,
        ],
        NodeClass::DataType => &[AttributeId::IsAbstract],
        NodeClass::View => &[AttributeId::ContainsNoLoops, AttributeId::EventNotifier],
        NodeClass::Unspecified => &[],
    };

    COMMON.iter().chain(specific).copied().collect()
}

/// One display row of the attribute view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    /// Attribute name.
    pub name: String,
    /// Rendered value.
    pub value: String,
    /// The value can be edited and written back.
    pub writable: bool,
}

impl AttributeRow {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            writable: false,
        }
    }
}

// =============================================================================
// AttributeAccess
// =============================================================================

/// Reads and writes node attributes over the current session.
pub struct AttributeAccess {
    sessions: Arc<SessionManager>,
    type_names: DashMap<NodeId, String>,
    cache_generation: Mutex<Option<u64>>,
    lookups: AtomicU64,
}

impl AttributeAccess {
    /// Creates an accessor bound to `sessions`.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            type_names: DashMap::new(),
            cache_generation: Mutex::new(None),
            lookups: AtomicU64::new(0),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = OpcUaResult<T>>) -> OpcUaResult<T> {
        let timeout = self.sessions.config().request_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| OpcUaError::request_timeout(timeout))?
    }

    async fn read_raw(&self, requests: &[ReadValueId]) -> OpcUaResult<Vec<AttributeValue>> {
        let active = self.sessions.current()?;
        self.bounded(active.session().read(requests)).await
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reads every attribute defined for `class`.
    ///
    /// Individual bad statuses are returned as-is.
    ///
    /// # Errors
    ///
    /// `OperationError::ReadFailed` carrying the first bad status when the
    /// server returns fewer results than requested.
    pub async fn read_attributes_for_class(
        &self,
        node_id: &NodeId,
        class: NodeClass,
    ) -> OpcUaResult<Vec<(AttributeId, AttributeValue)>> {
        let attributes = attributes_for_class(class);
        let requests: Vec<ReadValueId> = attributes
            .iter()
            .map(|a| ReadValueId::new(node_id.clone(), *a))
            .collect();

        let values = self.read_raw(&requests).await?;
        if values.len() < requests.len() {
            let status = values
                .iter()
                .map(|v| v.status)
                .find(|s| s.is_bad())
                .unwrap_or(StatusCode::BAD);
            warn!(
                node_id = %node_id,
                requested = requests.len(),
                returned = values.len(),
                %status,
                "Short attribute read"
            );
            return Err(OpcUaError::operation(OperationError::read_status(
                node_id.to_string(),
                status,
            )));
        }

        Ok(attributes.into_iter().zip(values).collect())
    }

    /// Reads the Value attribute, tagged with the node's data type.
    ///
    /// # Errors
    ///
    /// `OperationError::ReadFailed` on a short result or a bad value status.
    pub async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<AttributeValue> {
        let requests = [
            ReadValueId::new(node_id.clone(), AttributeId::Value),
            ReadValueId::new(node_id.clone(), AttributeId::DataType),
        ];
        let mut values = self.read_raw(&requests).await?.into_iter();
        let (Some(mut value), data_type) = (values.next(), values.next()) else {
            return Err(OpcUaError::read_failed(node_id.to_string(), "empty read result"));
        };
        if value.status.is_bad() {
            return Err(OpcUaError::operation(OperationError::read_status(
                node_id.to_string(),
                value.status,
            )));
        }
        if value.data_type.is_none() {
            value.data_type = data_type.and_then(|d| d.value.as_node_id().cloned());
        }
        Ok(value)
    }

    /// Reads the Value attribute of several nodes. Per-node statuses are
    /// returned as-is.
    pub async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<AttributeValue>> {
        let requests: Vec<ReadValueId> = node_ids
            .iter()
            .map(|n| ReadValueId::new(n.clone(), AttributeId::Value))
            .collect();
        self.read_raw(&requests).await
    }

    /// Reads `Server_ServerStatus_State`.
    pub async fn read_server_state(&self) -> OpcUaResult<ServerState> {
        let value = self.read_value(&NodeId::SERVER_STATE).await?;
        Ok(value
            .value
            .as_i64()
            .map(ServerState::from_value)
            .unwrap_or(ServerState::Unknown))
    }

    /// Reads `Server_ServerStatus_CurrentTime`.
    pub async fn read_server_time(&self) -> OpcUaResult<DateTime<Utc>> {
        let value = self.read_value(&NodeId::SERVER_CURRENT_TIME).await?;
        value.value.as_date_time().ok_or_else(|| {
            OpcUaError::type_mismatch(
                "DateTime",
                value.value.data_type().map(|t| t.name()).unwrap_or("Empty"),
            )
        })
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Writes one attribute. `value` must already be in the node's wire
    /// type.
    ///
    /// # Errors
    ///
    /// `OperationError::WriteFailed` on a bad status or a missing result.
    pub async fn write_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: AttributeId,
        value: Variant,
    ) -> OpcUaResult<StatusCode> {
        let active = self.sessions.current()?;
        let request = [WriteValue {
            node_id: node_id.clone(),
            attribute_id,
            value,
        }];
        let statuses = self.bounded(active.session().write(&request)).await?;

        let status = statuses
            .first()
            .copied()
            .ok_or_else(|| OpcUaError::write_failed(node_id.to_string(), "empty write result"))?;
        if status.is_bad() {
            warn!(node_id = %node_id, attribute = %attribute_id, %status, "Write rejected");
            return Err(OpcUaError::operation(OperationError::write_status(
                node_id.to_string(),
                status,
            )));
        }
        debug!(node_id = %node_id, attribute = %attribute_id, "Attribute written");
        Ok(status)
    }

    /// Parses `text` as the node's data type and writes it to Value.
    ///
    /// # Errors
    ///
    /// `ConversionError` when the data type is not a builtin scalar or the
    /// text does not parse.
    pub async fn write_from_string(&self, node_id: &NodeId, text: &str) -> OpcUaResult<StatusCode> {
        let read = self
            .read_raw(&[ReadValueId::new(node_id.clone(), AttributeId::DataType)])
            .await?;
        let data_type = read
            .first()
            .filter(|v| v.is_good())
            .and_then(|v| v.value.as_node_id().cloned())
            .ok_or_else(|| OpcUaError::read_failed(node_id.to_string(), "DataType unavailable"))?;

        let builtin = OpcUaDataType::from_node_id(&data_type).ok_or_else(|| {
            OpcUaError::conversion(ConversionError::unsupported_type(data_type.to_string()))
        })?;
        let value = codec::parse_for_data_type(builtin.type_id(), text)?;
        self.write_attribute(node_id, AttributeId::Value, value).await
    }

    // =========================================================================
    // Data type names
    // =========================================================================

    /// Returns the name of a data type, looking up non-builtin types once per
    /// session.
    pub async fn data_type_name(&self, data_type: &NodeId) -> OpcUaResult<String> {
        if let Some(name) = codec::data_type_name_of(data_type) {
            return Ok(name.to_string());
        }

        self.sync_cache();
        if let Some(name) = self.type_names.get(data_type) {
            return Ok(name.clone());
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let read = self
            .read_raw(&[ReadValueId::new(data_type.clone(), AttributeId::DisplayName)])
            .await?;
        let name = read
            .first()
            .filter(|v| v.is_good())
            .and_then(|v| v.value.as_text().map(str::to_string))
            .unwrap_or_else(|| data_type.to_string());

        debug!(data_type = %data_type, %name, "Resolved data type name");
        self.type_names.insert(data_type.clone(), name.clone());
        Ok(name)
    }

    /// Returns the number of data type lookups sent to the server.
    pub fn type_lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn sync_cache(&self) {
        let current = self.sessions.generation();
        let mut generation = self.cache_generation.lock();
        if *generation != current {
            self.type_names.clear();
            *generation = current;
        }
    }

    // =========================================================================
    // Display rows
    // =========================================================================

    /// Builds the attribute rows shown for a selected node.
    ///
    /// Reference fields need no round trip. TypeId is the encoding type of
    /// the reference itself. Local Variables add Value,
    /// DataType, ServerTime and StatusCode; Value is writable when the node
    /// grants CurrentWrite and its data type is a builtin scalar.
    pub async fn attribute_rows(&self, node: &NodeRef) -> OpcUaResult<Vec<AttributeRow>> {
        let mut rows = vec![
            AttributeRow::new("DisplayName", node.display_name.text.clone()),
            AttributeRow::new(
                "BrowseName",
                format!("{}:{}", node.browse_name.namespace_index, node.browse_name.name),
            ),
            AttributeRow::new("NodeId", node.node_id.to_string()),
            AttributeRow::new("NodeClass", node.node_class.name()),
            AttributeRow::new("ReferenceType", node.reference_type_id.to_string()),
            AttributeRow::new("Forward", node.is_forward.to_string()),
            AttributeRow::new("TypeId", NodeId::REFERENCE_DESCRIPTION.to_string()),
            AttributeRow::new("TypeDefinition", node.type_definition.to_string()),
        ];

        let Some(node_id) = node.local_id().filter(|_| node.node_class == NodeClass::Variable)
        else {
            return Ok(rows);
        };

        let requests = [
            ReadValueId::new(node_id.clone(), AttributeId::Value),
            ReadValueId::new(node_id.clone(), AttributeId::DataType),
            ReadValueId::new(node_id.clone(), AttributeId::AccessLevel),
        ];
        let values = self.read_raw(&requests).await?;
        let Some(value) = values.first() else {
            return Ok(rows);
        };

        let data_type = value
            .data_type
            .clone()
            .or_else(|| values.get(1).and_then(|d| d.value.as_node_id().cloned()));
        let access_level = values
            .get(2)
            .and_then(|a| a.value.as_i64())
            .and_then(|bits| u8::try_from(bits).ok())
            .unwrap_or(0);
        let writable = access_level & ACCESS_CURRENT_WRITE != 0
            && data_type.as_ref().is_some_and(codec::is_writable_type);

        rows.push(AttributeRow {
            writable,
            ..AttributeRow::new("Value", codec::variant_to_display(&value.value))
        });
        if let Some(data_type) = &data_type {
            rows.push(AttributeRow::new("DataType", self.data_type_name(data_type).await?));
        }
        rows.push(AttributeRow::new(
            "ServerTime",
            value
                .server_timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ));
        rows.push(AttributeRow::new("StatusCode", value.status.to_string()));
        Ok(rows)
    }
}

impl std::fmt::Debug for AttributeAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeAccess")
            .field("cached_type_names", &self.type_names.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

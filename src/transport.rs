//! Transport sessions.
//!
//! A transport session owns one physical connection (socket + framed
//! transport + binary-encoded RPC client) to exactly one cluster node at a
//! time. The [`Connector`] seam lets tests substitute in-memory sessions.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{
    Column, ColumnDef, Compression, ConsistencyLevel, CqlMetadata, CqlPreparedResult, CqlResult,
    CqlResultType, CqlRow, CqlRpc, EndpointDetails, KeyspaceDef, TableDef, TokenRange,
};
use crate::thrift::{message, ttype, Reader, Writer};

/// Upper bound on accepted reply frames.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Opens transport sessions to individual cluster nodes.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session to the given node. On failure the error carries no
    /// side effects on shared state.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn CqlRpc>>;
}

/// Connector producing framed binary-protocol sessions over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector with the given socket connect timeout.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn CqlRpc>> {
        let addr = format!("{host}:{port}");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::connect(format!("connect to {addr} timed out")))?
            .map_err(|e| Error::connect(format!("connect to {addr} failed: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::connect(format!("setsockopt on {addr} failed: {e}")))?;
        trace!(peer = %addr, "transport opened");
        Ok(Box::new(TcpRpc::new(stream, addr)))
    }
}

/// One framed binary-protocol RPC session over a TCP socket.
pub struct TcpRpc {
    stream: Option<TcpStream>,
    peer: String,
    io_timeout: Option<Duration>,
    seq_id: i32,
}

impl TcpRpc {
    fn new(stream: TcpStream, peer: String) -> Self {
        Self {
            stream: Some(stream),
            peer,
            io_timeout: None,
            seq_id: 0,
        }
    }

    /// Send one call frame and read the reply frame. Any socket fault
    /// poisons the session, so the transport is released on error.
    async fn call(&mut self, name: &str, write_args: impl FnOnce(&mut Writer)) -> Result<Vec<u8>> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::Transport("session is closed".into()));
        };

        self.seq_id += 1;
        let seq_id = self.seq_id;
        let mut writer = Writer::new();
        writer.message_begin(name, message::CALL, seq_id);
        write_args(&mut writer);
        writer.field_stop();
        let frame = writer.into_frame();

        let round_trip = async {
            stream.write_all(&frame).await?;
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let len = u32::from_be_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                return Ok(Err(Error::protocol(format!("oversized frame: {len} bytes"))));
            }
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).await?;
            Ok(Ok(body))
        };

        let outcome: std::result::Result<Result<Vec<u8>>, std::io::Error> = match self.io_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, round_trip).await {
                Ok(io_result) => io_result,
                Err(_) => {
                    return Err(Error::Timeout(format!("{name} on {} timed out", self.peer)));
                }
            },
            None => round_trip.await,
        };

        let body = match outcome {
            Ok(Ok(body)) => body,
            Ok(Err(protocol_err)) => {
                self.close();
                return Err(protocol_err);
            }
            Err(io_err) => {
                self.close();
                return Err(Error::Transport(format!(
                    "{name} on {} failed: {io_err}",
                    self.peer
                )));
            }
        };

        trace!(call = name, peer = %self.peer, reply_len = body.len(), "call completed");
        Ok(body)
    }
}

/// Read the reply envelope, surfacing server-reported application
/// exceptions, and leave the reader at the result struct.
fn open_reply<'a>(body: &'a [u8], expected_seq: i32) -> Result<Reader<'a>> {
    let mut reader = Reader::new(body);
    let (name, message_type, seq_id) = reader.message_begin()?;
    if seq_id != expected_seq {
        return Err(Error::protocol(format!(
            "out-of-order reply to {name}: seq {seq_id}, expected {expected_seq}"
        )));
    }
    if message_type == message::EXCEPTION {
        let mut text = String::from("unknown application exception");
        while let Some((field_type, id)) = reader.field_begin()? {
            if id == 1 && field_type == ttype::STRING {
                text = reader.string()?;
            } else {
                reader.skip(field_type)?;
            }
        }
        return Err(Error::Transport(text));
    }
    if message_type != message::REPLY {
        return Err(Error::protocol(format!("unexpected message type {message_type}")));
    }
    Ok(reader)
}

/// Decode a struct that only carries a `why` message (field 1).
fn read_why(reader: &mut Reader<'_>) -> Result<String> {
    let mut why = String::new();
    while let Some((field_type, id)) = reader.field_begin()? {
        if id == 1 && field_type == ttype::STRING {
            why = reader.string()?;
        } else {
            reader.skip(field_type)?;
        }
    }
    Ok(why)
}

/// Skip a declared-exception struct whose fields carry no message.
fn skip_struct(reader: &mut Reader<'_>) -> Result<()> {
    while let Some((field_type, _)) = reader.field_begin()? {
        reader.skip(field_type)?;
    }
    Ok(())
}

/// Map the declared exceptions shared by the execute/prepare call family.
fn query_exception(reader: &mut Reader<'_>, field_id: i16) -> Result<Error> {
    match field_id {
        1 => {
            let why = read_why(reader)?;
            Ok(Error::Syntax(why))
        }
        2 => {
            skip_struct(reader)?;
            Ok(Error::Unavailable(
                "not enough replicas available for the requested consistency".into(),
            ))
        }
        3 => {
            skip_struct(reader)?;
            Ok(Error::Timeout("cluster operation timed out".into()))
        }
        4 => {
            skip_struct(reader)?;
            Ok(Error::SchemaDisagreement(
                "client and server schema versions disagree".into(),
            ))
        }
        other => {
            skip_struct(reader)?;
            Ok(Error::Transport(format!("undeclared exception field {other}")))
        }
    }
}

fn read_column(reader: &mut Reader<'_>) -> Result<Column> {
    let mut column = Column {
        name: Bytes::new(),
        value: None,
        timestamp: None,
        ttl: None,
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => column.name = reader.binary()?,
            (2, ttype::STRING) => column.value = Some(reader.binary()?),
            (3, ttype::I64) => column.timestamp = Some(reader.i64()?),
            (4, ttype::I32) => column.ttl = Some(reader.i32()?),
            _ => reader.skip(field_type)?,
        }
    }
    Ok(column)
}

fn read_cql_row(reader: &mut Reader<'_>) -> Result<CqlRow> {
    let mut row = CqlRow::default();
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => row.key = reader.binary()?,
            (2, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                row.columns.reserve(len);
                for _ in 0..len {
                    row.columns.push(read_column(reader)?);
                }
            }
            _ => reader.skip(field_type)?,
        }
    }
    Ok(row)
}

fn read_metadata(reader: &mut Reader<'_>) -> Result<CqlMetadata> {
    let mut metadata = CqlMetadata::default();
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::MAP) => {
                let (_, _, len) = reader.map_begin()?;
                for _ in 0..len {
                    let key = reader.binary()?;
                    let value = reader.string()?;
                    metadata.name_types.insert(key, value);
                }
            }
            (2, ttype::MAP) => {
                let (_, _, len) = reader.map_begin()?;
                for _ in 0..len {
                    let key = reader.binary()?;
                    let value = reader.string()?;
                    metadata.value_types.insert(key, value);
                }
            }
            (3, ttype::STRING) => metadata.default_name_type = reader.string()?,
            (4, ttype::STRING) => metadata.default_value_type = reader.string()?,
            _ => reader.skip(field_type)?,
        }
    }
    Ok(metadata)
}

fn read_cql_result(reader: &mut Reader<'_>) -> Result<CqlResult> {
    let mut result = CqlResult::void();
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::I32) => {
                let raw = reader.i32()?;
                result.result_type = CqlResultType::from_wire(raw)
                    .ok_or_else(|| Error::protocol(format!("unknown result type {raw}")))?;
            }
            (2, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                result.rows.reserve(len);
                for _ in 0..len {
                    result.rows.push(read_cql_row(reader)?);
                }
            }
            (3, ttype::I32) => result.num = Some(reader.i32()?),
            (4, ttype::STRUCT) => result.schema = Some(read_metadata(reader)?),
            _ => reader.skip(field_type)?,
        }
    }
    Ok(result)
}

fn read_prepared_result(reader: &mut Reader<'_>) -> Result<CqlPreparedResult> {
    let mut prepared = CqlPreparedResult {
        item_id: 0,
        count: 0,
        variable_types: Vec::new(),
        variable_names: Vec::new(),
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::I32) => prepared.item_id = reader.i32()?,
            (2, ttype::I32) => prepared.count = reader.i32()?,
            (3, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                for _ in 0..len {
                    prepared.variable_types.push(reader.string()?);
                }
            }
            (4, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                for _ in 0..len {
                    prepared.variable_names.push(reader.string()?);
                }
            }
            _ => reader.skip(field_type)?,
        }
    }
    Ok(prepared)
}

fn read_endpoint_details(reader: &mut Reader<'_>) -> Result<EndpointDetails> {
    let mut endpoint = EndpointDetails {
        host: String::new(),
        datacenter: String::new(),
        rack: None,
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => endpoint.host = reader.string()?,
            (2, ttype::STRING) => endpoint.datacenter = reader.string()?,
            (3, ttype::STRING) => endpoint.rack = Some(reader.string()?),
            _ => reader.skip(field_type)?,
        }
    }
    Ok(endpoint)
}

fn read_token_range(reader: &mut Reader<'_>) -> Result<TokenRange> {
    let mut range = TokenRange {
        start_token: String::new(),
        end_token: String::new(),
        endpoint_details: Vec::new(),
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => range.start_token = reader.string()?,
            (2, ttype::STRING) => range.end_token = reader.string()?,
            (5, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                for _ in 0..len {
                    range.endpoint_details.push(read_endpoint_details(reader)?);
                }
            }
            _ => reader.skip(field_type)?,
        }
    }
    Ok(range)
}

fn read_column_def(reader: &mut Reader<'_>) -> Result<ColumnDef> {
    let mut def = ColumnDef {
        name: Bytes::new(),
        validation_class: String::new(),
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => def.name = reader.binary()?,
            (2, ttype::STRING) => def.validation_class = reader.string()?,
            _ => reader.skip(field_type)?,
        }
    }
    Ok(def)
}

fn read_table_def(reader: &mut Reader<'_>) -> Result<TableDef> {
    let mut table = TableDef {
        name: String::new(),
        columns: Vec::new(),
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (2, ttype::STRING) => table.name = reader.string()?,
            (13, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                for _ in 0..len {
                    table.columns.push(read_column_def(reader)?);
                }
            }
            _ => reader.skip(field_type)?,
        }
    }
    Ok(table)
}

fn read_ks_def(reader: &mut Reader<'_>) -> Result<KeyspaceDef> {
    let mut keyspace = KeyspaceDef {
        name: String::new(),
        strategy_class: String::new(),
        tables: Vec::new(),
    };
    while let Some((field_type, id)) = reader.field_begin()? {
        match (id, field_type) {
            (1, ttype::STRING) => keyspace.name = reader.string()?,
            (2, ttype::STRING) => keyspace.strategy_class = reader.string()?,
            (5, ttype::LIST) => {
                let (_, len) = reader.list_begin()?;
                for _ in 0..len {
                    keyspace.tables.push(read_table_def(reader)?);
                }
            }
            _ => reader.skip(field_type)?,
        }
    }
    Ok(keyspace)
}

/// Reject the compression options the transport does not implement.
fn check_compression(compression: Compression) -> Result<()> {
    if compression == Compression::Gzip {
        return Err(Error::config("GZIP query compression is not supported"));
    }
    Ok(())
}

#[async_trait]
impl CqlRpc for TcpRpc {
    async fn describe_cluster_name(&mut self) -> Result<String> {
        let body = self.call("describe_cluster_name", |_| {}).await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut name = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            if id == 0 && field_type == ttype::STRING {
                name = Some(reader.string()?);
            } else {
                reader.skip(field_type)?;
            }
        }
        name.ok_or_else(|| Error::protocol("describe_cluster_name reply missing result"))
    }

    async fn describe_ring(&mut self, keyspace: &str) -> Result<Vec<TokenRange>> {
        let body = self
            .call("describe_ring", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.string(keyspace);
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut ring = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::LIST) => {
                    let (_, len) = reader.list_begin()?;
                    let mut ranges = Vec::with_capacity(len);
                    for _ in 0..len {
                        ranges.push(read_token_range(&mut reader)?);
                    }
                    ring = Some(ranges);
                }
                (1, _) => {
                    let why = read_why(&mut reader)?;
                    return Err(Error::Syntax(why));
                }
                _ => reader.skip(field_type)?,
            }
        }
        ring.ok_or_else(|| Error::protocol("describe_ring reply missing result"))
    }

    async fn describe_keyspaces(&mut self) -> Result<Vec<KeyspaceDef>> {
        let body = self.call("describe_keyspaces", |_| {}).await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut keyspaces = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::LIST) => {
                    let (_, len) = reader.list_begin()?;
                    let mut defs = Vec::with_capacity(len);
                    for _ in 0..len {
                        defs.push(read_ks_def(&mut reader)?);
                    }
                    keyspaces = Some(defs);
                }
                (1, _) => {
                    let why = read_why(&mut reader)?;
                    return Err(Error::Syntax(why));
                }
                _ => reader.skip(field_type)?,
            }
        }
        keyspaces.ok_or_else(|| Error::protocol("describe_keyspaces reply missing result"))
    }

    async fn set_keyspace(&mut self, keyspace: &str) -> Result<()> {
        let body = self
            .call("set_keyspace", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.string(keyspace);
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        while let Some((field_type, id)) = reader.field_begin()? {
            if id == 1 {
                let why = read_why(&mut reader)?;
                return Err(Error::Syntax(why));
            }
            reader.skip(field_type)?;
        }
        Ok(())
    }

    async fn login(&mut self, credentials: &HashMap<String, String>) -> Result<()> {
        let body = self
            .call("login", |writer| {
                // auth_request struct, field 1: credentials map
                writer.field_begin(ttype::STRUCT, 1);
                writer.field_begin(ttype::MAP, 1);
                writer.map_begin(ttype::STRING, ttype::STRING, credentials.len());
                for (key, value) in credentials {
                    writer.string(key);
                    writer.string(value);
                }
                writer.field_stop();
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        while let Some((field_type, id)) = reader.field_begin()? {
            match id {
                1 | 2 => {
                    let why = read_why(&mut reader)?;
                    return Err(Error::Authentication(why));
                }
                _ => reader.skip(field_type)?,
            }
        }
        Ok(())
    }

    async fn set_cql_version(&mut self, version: &str) -> Result<()> {
        let body = self
            .call("set_cql_version", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.string(version);
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        while let Some((field_type, id)) = reader.field_begin()? {
            if id == 1 {
                let why = read_why(&mut reader)?;
                return Err(Error::Syntax(why));
            }
            reader.skip(field_type)?;
        }
        Ok(())
    }

    async fn execute_cql_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlResult> {
        check_compression(compression)?;
        let body = self
            .call("execute_cql_query", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.binary(&query);
                writer.field_begin(ttype::I32, 2);
                writer.i32(compression.wire());
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut result = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => result = Some(read_cql_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        result.ok_or_else(|| Error::protocol("execute_cql_query reply missing result"))
    }

    async fn execute_cql3_query(
        &mut self,
        query: Bytes,
        compression: Compression,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        check_compression(compression)?;
        let body = self
            .call("execute_cql3_query", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.binary(&query);
                writer.field_begin(ttype::I32, 2);
                writer.i32(compression.wire());
                writer.field_begin(ttype::I32, 3);
                writer.i32(consistency.wire());
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut result = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => result = Some(read_cql_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        result.ok_or_else(|| Error::protocol("execute_cql3_query reply missing result"))
    }

    async fn prepare_cql_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlPreparedResult> {
        check_compression(compression)?;
        let body = self
            .call("prepare_cql_query", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.binary(&query);
                writer.field_begin(ttype::I32, 2);
                writer.i32(compression.wire());
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut prepared = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => prepared = Some(read_prepared_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        prepared.ok_or_else(|| Error::protocol("prepare_cql_query reply missing result"))
    }

    async fn prepare_cql3_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlPreparedResult> {
        check_compression(compression)?;
        let body = self
            .call("prepare_cql3_query", |writer| {
                writer.field_begin(ttype::STRING, 1);
                writer.binary(&query);
                writer.field_begin(ttype::I32, 2);
                writer.i32(compression.wire());
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut prepared = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => prepared = Some(read_prepared_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        prepared.ok_or_else(|| Error::protocol("prepare_cql3_query reply missing result"))
    }

    async fn execute_prepared_cql_query(
        &mut self,
        item_id: i32,
        values: Vec<Bytes>,
    ) -> Result<CqlResult> {
        let body = self
            .call("execute_prepared_cql_query", |writer| {
                writer.field_begin(ttype::I32, 1);
                writer.i32(item_id);
                writer.field_begin(ttype::LIST, 2);
                writer.list_begin(ttype::STRING, values.len());
                for value in &values {
                    writer.binary(value);
                }
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut result = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => result = Some(read_cql_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        result.ok_or_else(|| Error::protocol("execute_prepared_cql_query reply missing result"))
    }

    async fn execute_prepared_cql3_query(
        &mut self,
        item_id: i32,
        values: Vec<Bytes>,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        let body = self
            .call("execute_prepared_cql3_query", |writer| {
                writer.field_begin(ttype::I32, 1);
                writer.i32(item_id);
                writer.field_begin(ttype::LIST, 2);
                writer.list_begin(ttype::STRING, values.len());
                for value in &values {
                    writer.binary(value);
                }
                writer.field_begin(ttype::I32, 3);
                writer.i32(consistency.wire());
            })
            .await?;
        let mut reader = open_reply(&body, self.seq_id)?;
        let mut result = None;
        while let Some((field_type, id)) = reader.field_begin()? {
            match (id, field_type) {
                (0, ttype::STRUCT) => result = Some(read_cql_result(&mut reader)?),
                (_, ttype::STRUCT) => return Err(query_exception(&mut reader, id)?),
                _ => reader.skip(field_type)?,
            }
        }
        result.ok_or_else(|| Error::protocol("execute_prepared_cql3_query reply missing result"))
    }

    fn set_io_timeout(&mut self, timeout: Duration) {
        self.io_timeout = if timeout.is_zero() { None } else { Some(timeout) };
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            trace!(peer = %self.peer, "transport closed");
        }
    }
}

impl std::fmt::Debug for TcpRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRpc")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

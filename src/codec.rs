//! Wire codecs - bit-exact flyweight encoders and decoders.
//!
//! Every message is an 8-byte header followed by a fixed-layout body.
//! All multi-byte fields are little-endian. The flyweights store only
//! a buffer reference and an offset; they are reusable across calls
//! and never allocate.

use crate::command::{CancelOrder, NewOrderSingle, OrderType, Side};

/// Message header size in bytes
pub const HEADER_SIZE: usize = 8;

/// NewOrderSingle body size in bytes
pub const NEW_ORDER_SINGLE_SIZE: usize = 42;
/// CancelOrder body size in bytes
pub const CANCEL_ORDER_SIZE: usize = 20;
/// ExecutionReport body size in bytes
pub const EXECUTION_REPORT_SIZE: usize = 54;

/// Template id for NewOrderSingle
pub const NEW_ORDER_SINGLE_TEMPLATE_ID: u16 = 1;
/// Template id for CancelOrder
pub const CANCEL_ORDER_TEMPLATE_ID: u16 = 2;
/// Template id for ExecutionReport
pub const EXECUTION_REPORT_TEMPLATE_ID: u16 = 3;

/// Schema identity stamped into every emitted header
pub const SCHEMA_ID: u16 = 1;
/// Schema version stamped into every emitted header
pub const SCHEMA_VERSION: u16 = 1;

/// Header + ExecutionReport body: the footprint of one emitted report
pub const REPORT_BYTES: usize = HEADER_SIZE + EXECUTION_REPORT_SIZE;

// ============================================================================
// Little-endian primitives
// ============================================================================

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

#[inline]
fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

#[inline]
fn read_i64(buf: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

#[inline]
fn write_u16(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_i64(buf: &mut [u8], offset: usize, v: i64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

// ============================================================================
// Message header
// ============================================================================

/// Header layout: blockLength u16 @0, templateId u16 @2, schemaId u16 @4,
/// version u16 @6.
pub struct MessageHeaderDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> MessageHeaderDecoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn block_length(&self) -> u16 {
        read_u16(self.buf, self.offset)
    }

    #[inline]
    pub fn template_id(&self) -> u16 {
        read_u16(self.buf, self.offset + 2)
    }

    #[inline]
    pub fn schema_id(&self) -> u16 {
        read_u16(self.buf, self.offset + 4)
    }

    #[inline]
    pub fn version(&self) -> u16 {
        read_u16(self.buf, self.offset + 6)
    }
}

pub struct MessageHeaderEncoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> MessageHeaderEncoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn block_length(&mut self, v: u16) -> &mut Self {
        write_u16(self.buf, self.offset, v);
        self
    }

    #[inline]
    pub fn template_id(&mut self, v: u16) -> &mut Self {
        write_u16(self.buf, self.offset + 2, v);
        self
    }

    #[inline]
    pub fn schema_id(&mut self, v: u16) -> &mut Self {
        write_u16(self.buf, self.offset + 4, v);
        self
    }

    #[inline]
    pub fn version(&mut self, v: u16) -> &mut Self {
        write_u16(self.buf, self.offset + 6, v);
        self
    }
}

// ============================================================================
// NewOrderSingle (template 1, 42 bytes)
// ============================================================================

/// Body layout: orderId u64 @0, price i64 @8, clientId u64 @16,
/// timestampNs i64 @24, instrumentId u32 @32, quantity u32 @36,
/// side u8 @40, orderType u8 @41.
pub struct NewOrderSingleDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> NewOrderSingleDecoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn order_id(&self) -> u64 {
        read_u64(self.buf, self.offset)
    }

    #[inline]
    pub fn price(&self) -> i64 {
        read_i64(self.buf, self.offset + 8)
    }

    #[inline]
    pub fn client_id(&self) -> u64 {
        read_u64(self.buf, self.offset + 16)
    }

    #[inline]
    pub fn timestamp_ns(&self) -> i64 {
        read_i64(self.buf, self.offset + 24)
    }

    #[inline]
    pub fn instrument_id(&self) -> u32 {
        read_u32(self.buf, self.offset + 32)
    }

    #[inline]
    pub fn quantity(&self) -> u32 {
        read_u32(self.buf, self.offset + 36)
    }

    #[inline]
    pub fn side(&self) -> u8 {
        self.buf[self.offset + 40]
    }

    #[inline]
    pub fn order_type(&self) -> u8 {
        self.buf[self.offset + 41]
    }

    /// Decode the whole body into its command struct.
    #[inline]
    pub fn decode(&self) -> NewOrderSingle {
        NewOrderSingle {
            order_id: self.order_id(),
            price: self.price(),
            client_id: self.client_id(),
            timestamp_ns: self.timestamp_ns(),
            instrument_id: self.instrument_id() as i32,
            quantity: self.quantity() as i32,
            side: Side::from_wire(self.side()),
            order_type: OrderType::from_wire(self.order_type()),
        }
    }
}

pub struct NewOrderSingleEncoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> NewOrderSingleEncoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    /// Encode the whole body from its command struct.
    pub fn encode(&mut self, order: &NewOrderSingle) -> &mut Self {
        write_u64(self.buf, self.offset, order.order_id);
        write_i64(self.buf, self.offset + 8, order.price);
        write_u64(self.buf, self.offset + 16, order.client_id);
        write_i64(self.buf, self.offset + 24, order.timestamp_ns);
        write_u32(self.buf, self.offset + 32, order.instrument_id as u32);
        write_u32(self.buf, self.offset + 36, order.quantity as u32);
        self.buf[self.offset + 40] = order.side.to_wire();
        self.buf[self.offset + 41] = order.order_type.to_wire();
        self
    }
}

// ============================================================================
// CancelOrder (template 2, 20 bytes)
// ============================================================================

/// Body layout: orderId u64 @0, clientId u64 @8, instrumentId u32 @16.
pub struct CancelOrderDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> CancelOrderDecoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn order_id(&self) -> u64 {
        read_u64(self.buf, self.offset)
    }

    #[inline]
    pub fn client_id(&self) -> u64 {
        read_u64(self.buf, self.offset + 8)
    }

    #[inline]
    pub fn instrument_id(&self) -> u32 {
        read_u32(self.buf, self.offset + 16)
    }

    #[inline]
    pub fn decode(&self) -> CancelOrder {
        CancelOrder {
            order_id: self.order_id(),
            client_id: self.client_id(),
            instrument_id: self.instrument_id() as i32,
        }
    }
}

pub struct CancelOrderEncoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> CancelOrderEncoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn encode(&mut self, cancel: &CancelOrder) -> &mut Self {
        write_u64(self.buf, self.offset, cancel.order_id);
        write_u64(self.buf, self.offset + 8, cancel.client_id);
        write_u32(self.buf, self.offset + 16, cancel.instrument_id as u32);
        self
    }
}

// ============================================================================
// ExecutionReport (template 3, 54 bytes)
// ============================================================================

/// Body layout: orderId u64 @0, execId u64 @8, price i64 @16,
/// clientId u64 @24, matchTimestampNs i64 @32, instrumentId u32 @40,
/// filledQuantity u32 @44, remainingQuantity u32 @48, side u8 @52,
/// execType u8 @53.
pub struct ExecutionReportDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ExecutionReportDecoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn order_id(&self) -> u64 {
        read_u64(self.buf, self.offset)
    }

    #[inline]
    pub fn exec_id(&self) -> u64 {
        read_u64(self.buf, self.offset + 8)
    }

    #[inline]
    pub fn price(&self) -> i64 {
        read_i64(self.buf, self.offset + 16)
    }

    #[inline]
    pub fn client_id(&self) -> u64 {
        read_u64(self.buf, self.offset + 24)
    }

    #[inline]
    pub fn match_timestamp_ns(&self) -> i64 {
        read_i64(self.buf, self.offset + 32)
    }

    #[inline]
    pub fn instrument_id(&self) -> u32 {
        read_u32(self.buf, self.offset + 40)
    }

    #[inline]
    pub fn filled_quantity(&self) -> u32 {
        read_u32(self.buf, self.offset + 44)
    }

    #[inline]
    pub fn remaining_quantity(&self) -> u32 {
        read_u32(self.buf, self.offset + 48)
    }

    #[inline]
    pub fn side(&self) -> u8 {
        self.buf[self.offset + 52]
    }

    #[inline]
    pub fn exec_type(&self) -> u8 {
        self.buf[self.offset + 53]
    }
}

pub struct ExecutionReportEncoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> ExecutionReportEncoder<'a> {
    #[inline]
    pub fn wrap(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub fn order_id(&mut self, v: u64) -> &mut Self {
        write_u64(self.buf, self.offset, v);
        self
    }

    #[inline]
    pub fn exec_id(&mut self, v: u64) -> &mut Self {
        write_u64(self.buf, self.offset + 8, v);
        self
    }

    #[inline]
    pub fn price(&mut self, v: i64) -> &mut Self {
        write_i64(self.buf, self.offset + 16, v);
        self
    }

    #[inline]
    pub fn client_id(&mut self, v: u64) -> &mut Self {
        write_u64(self.buf, self.offset + 24, v);
        self
    }

    #[inline]
    pub fn match_timestamp_ns(&mut self, v: i64) -> &mut Self {
        write_i64(self.buf, self.offset + 32, v);
        self
    }

    #[inline]
    pub fn instrument_id(&mut self, v: u32) -> &mut Self {
        write_u32(self.buf, self.offset + 40, v);
        self
    }

    #[inline]
    pub fn filled_quantity(&mut self, v: u32) -> &mut Self {
        write_u32(self.buf, self.offset + 44, v);
        self
    }

    #[inline]
    pub fn remaining_quantity(&mut self, v: u32) -> &mut Self {
        write_u32(self.buf, self.offset + 48, v);
        self
    }

    #[inline]
    pub fn side(&mut self, v: u8) -> &mut Self {
        self.buf[self.offset + 52] = v;
        self
    }

    #[inline]
    pub fn exec_type(&mut self, v: u8) -> &mut Self {
        self.buf[self.offset + 53] = v;
        self
    }
}

/// Encode a message header for the given template at `offset`.
/// Returns the offset of the body that follows.
#[inline]
pub fn encode_header(buf: &mut [u8], offset: usize, template_id: u16, block_length: u16) -> usize {
    MessageHeaderEncoder::wrap(buf, offset)
        .block_length(block_length)
        .template_id(template_id)
        .schema_id(SCHEMA_ID)
        .version(SCHEMA_VERSION);
    offset + HEADER_SIZE
}

/// Frame a NewOrderSingle command (header + body) at `offset`.
/// Returns total bytes written. Test and gateway convenience; the
/// core only decodes this message.
pub fn encode_new_order(buf: &mut [u8], offset: usize, order: &NewOrderSingle) -> usize {
    let body = encode_header(
        buf,
        offset,
        NEW_ORDER_SINGLE_TEMPLATE_ID,
        NEW_ORDER_SINGLE_SIZE as u16,
    );
    NewOrderSingleEncoder::wrap(buf, body).encode(order);
    HEADER_SIZE + NEW_ORDER_SINGLE_SIZE
}

/// Frame a CancelOrder command (header + body) at `offset`.
/// Returns total bytes written.
pub fn encode_cancel_order(buf: &mut [u8], offset: usize, cancel: &CancelOrder) -> usize {
    let body = encode_header(
        buf,
        offset,
        CANCEL_ORDER_TEMPLATE_ID,
        CANCEL_ORDER_SIZE as u16,
    );
    CancelOrderEncoder::wrap(buf, body).encode(cancel);
    HEADER_SIZE + CANCEL_ORDER_SIZE
}

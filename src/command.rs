//! Command and report types for the matching core.
//!
//! Commands arrive decoded from the replicated command log.
//! Reports leave as wire-encoded execution reports.

/// Fixed-point price scale: integer price = price x 10^8
pub const PRICE_SCALE: i64 = 100_000_000;

/// Order side (buy = bid, sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Wire value ({0, 1})
    #[inline]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    /// Decode a wire value. Inputs are pre-validated by the gateway.
    #[inline]
    pub fn from_wire(v: u8) -> Self {
        debug_assert!(v <= 1, "invalid side wire value {v}");
        if v == 0 { Side::Buy } else { Side::Sell }
    }
}

/// Order type determines matching behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order - rests in book if not fully matched (default)
    #[default]
    Limit = 0,
    /// Market order - matches at any price, rejected when no liquidity
    Market = 1,
}

impl OrderType {
    #[inline]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_wire(v: u8) -> Self {
        debug_assert!(v <= 1, "invalid order type wire value {v}");
        if v == 0 { OrderType::Limit } else { OrderType::Market }
    }
}

/// Execution report type, encoded on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecType {
    /// Order accepted and resting
    New = 0,
    /// Order partially filled
    PartialFill = 1,
    /// Order fully filled
    Fill = 2,
    /// Order canceled
    Canceled = 3,
    /// Order rejected
    Rejected = 4,
}

impl ExecType {
    #[inline]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_wire(v: u8) -> Self {
        match v {
            0 => ExecType::New,
            1 => ExecType::PartialFill,
            2 => ExecType::Fill,
            3 => ExecType::Canceled,
            4 => ExecType::Rejected,
            _ => panic!("invalid exec type wire value {v}"),
        }
    }
}

// ============================================================================
// Decoded commands
// ============================================================================

/// Place a new order (decoded NewOrderSingle body)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrderSingle {
    /// External order ID (client-assigned)
    pub order_id: u64,
    /// Fixed-point limit price (ignored for market orders)
    pub price: i64,
    /// Originating client ID
    pub client_id: u64,
    /// Ingress timestamp from the gateway
    pub timestamp_ns: i64,
    /// Target instrument
    pub instrument_id: i32,
    /// Order quantity
    pub quantity: i32,
    /// Order side
    pub side: Side,
    /// Order type (limit or market)
    pub order_type: OrderType,
}

impl NewOrderSingle {
    /// Create a limit order (most common case)
    #[inline]
    pub const fn limit(
        order_id: u64,
        client_id: u64,
        instrument_id: i32,
        side: Side,
        price: i64,
        quantity: i32,
    ) -> Self {
        Self {
            order_id,
            price,
            client_id,
            timestamp_ns: 0,
            instrument_id,
            quantity,
            side,
            order_type: OrderType::Limit,
        }
    }

    /// Create a market order
    #[inline]
    pub const fn market(
        order_id: u64,
        client_id: u64,
        instrument_id: i32,
        side: Side,
        quantity: i32,
    ) -> Self {
        Self {
            order_id,
            price: 0,
            client_id,
            timestamp_ns: 0,
            instrument_id,
            quantity,
            side,
            order_type: OrderType::Market,
        }
    }
}

/// Cancel an existing order (decoded CancelOrder body)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelOrder {
    /// Order ID to cancel
    pub order_id: u64,
    /// Requesting client ID
    pub client_id: u64,
    /// Instrument the order rests on
    pub instrument_id: i32,
}

/// Input commands from the replicated log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Place a new order
    New(NewOrderSingle),
    /// Cancel an existing order
    Cancel(CancelOrder),
}

/// A command tagged with its cluster-assigned timestamp, as handed to
/// the engine thread by the log consumer.
#[derive(Clone, Copy, Debug)]
pub struct SequencedCommand {
    pub command: Command,
    /// Deterministic timestamp assigned by the cluster; identical
    /// across replicas for the same command.
    pub cluster_timestamp_ns: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_side_wire_values() {
        assert_eq!(Side::Buy.to_wire(), 0);
        assert_eq!(Side::Sell.to_wire(), 1);
        assert_eq!(Side::from_wire(0), Side::Buy);
        assert_eq!(Side::from_wire(1), Side::Sell);
    }

    #[test]
    fn test_order_type_wire_values() {
        assert_eq!(OrderType::Limit.to_wire(), 0);
        assert_eq!(OrderType::Market.to_wire(), 1);
        assert_eq!(OrderType::from_wire(0), OrderType::Limit);
        assert_eq!(OrderType::from_wire(1), OrderType::Market);
        assert_eq!(OrderType::default(), OrderType::Limit);
    }

    #[test]
    fn test_exec_type_round_trip() {
        for et in [
            ExecType::New,
            ExecType::PartialFill,
            ExecType::Fill,
            ExecType::Canceled,
            ExecType::Rejected,
        ] {
            assert_eq!(ExecType::from_wire(et.to_wire()), et);
        }
        assert_eq!(ExecType::Rejected.to_wire(), 4);
    }

    #[test]
    fn test_order_constructors() {
        let limit = NewOrderSingle::limit(1, 100, 7, Side::Buy, 10 * PRICE_SCALE, 50);
        assert_eq!(limit.order_type, OrderType::Limit);
        assert_eq!(limit.price, 1_000_000_000);

        let market = NewOrderSingle::market(2, 100, 7, Side::Sell, 50);
        assert_eq!(market.order_type, OrderType::Market);
        assert_eq!(market.price, 0);
    }

    #[test]
    fn test_command_variants() {
        let place = Command::New(NewOrderSingle::limit(1, 1, 1, Side::Buy, 100, 10));
        let cancel = Command::Cancel(CancelOrder {
            order_id: 1,
            client_id: 1,
            instrument_id: 1,
        });

        match place {
            Command::New(o) => assert_eq!(o.order_id, 1),
            _ => panic!("expected New"),
        }
        match cancel {
            Command::Cancel(c) => assert_eq!(c.order_id, 1),
            _ => panic!("expected Cancel"),
        }
    }
}

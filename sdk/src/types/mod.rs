//! Core types for the 1Token SDK.
//!
//! These types are shared by the REST client and the push session: an
//! order pushed over the socket decodes into the same [`Order`] returned by
//! `GET /orders`.

pub mod account;
pub mod fund;
pub mod ids;
pub mod order;
pub mod symbol;

pub use account::{AccountInfo, Position};
pub use fund::{
    BorrowRequest, MarginTransferRequest, RepayRequest, TransferTarget, WithdrawRequest,
};
pub use ids::{rand_client_oid, rand_client_wid, rand_id};
pub use order::{AmendOrderRequest, Order, OrderAck, OrderState, PlaceOrderRequest, Side};
pub use symbol::AccountSymbol;

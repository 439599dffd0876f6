pub mod assignment;
pub mod cart;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod mongo;
pub mod orders;
pub mod reconciliation;
pub mod stores;

pub use assignment::{
    haversine_km, AssignmentDispatcher, AssignmentJob, AssignmentOutcome, AssignmentQueue,
    AssignmentService,
};
pub use cart::{CartService, CartView, CartViewLine};
pub use ledger::LedgerService;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use mongo::MongoStore;
pub use orders::OrderService;
pub use reconciliation::{ReconciliationService, SweepReport};
pub use stores::{
    CartStore, CatalogStore, ConfirmOutcome, CourierStore, OfferStore, OrderStore, StatusUpdate,
    Stores, TransactionStore,
};

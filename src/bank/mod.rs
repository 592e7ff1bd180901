pub mod arena;
pub mod banks;
pub mod message_bank;

pub use arena::CellArena;
pub use banks::{BanksInputs, BanksOutputs, ResponseBanks};
pub use message_bank::{BankInputs, BankOutputs, BankStats, Message, MessageBank, Reservation};

pub mod balance;
pub mod holders;
pub mod sender;
pub mod swap;
pub mod transfer;
pub mod withdraw;

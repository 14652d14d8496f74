pub mod commands;
pub mod ignore;
pub mod pip;
pub mod reference;
pub mod sync;

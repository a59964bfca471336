pub mod app;
mod cards;
mod commands;
mod context;
mod dispatch;
mod env;
mod info;
mod output;
mod run;
mod runtime;
mod store;

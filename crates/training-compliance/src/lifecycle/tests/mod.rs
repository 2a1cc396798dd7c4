mod common;

mod statistics;

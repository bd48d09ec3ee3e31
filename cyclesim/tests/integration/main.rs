// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod engine_equivalence;
mod engine_errors;
mod engine_ordering;
mod ticking_protocol;

//! Test suite for the recompiler workspace.


#[cfg(test)]
mod backend;
#[cfg(test)]
mod exec;
#[cfg(test)]
mod integration;

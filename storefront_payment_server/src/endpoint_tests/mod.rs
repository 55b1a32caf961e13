mod helpers;
mod mocks;

mod checkout;
mod orders;
mod webhook;

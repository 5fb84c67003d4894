pub mod iq;

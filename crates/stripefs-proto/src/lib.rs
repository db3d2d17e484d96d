//! StripeFS Protocol - gRPC service definitions
//!
//! This crate contains the protobuf-generated code for StripeFS's
//! internal gRPC services.

/// Metadata service (namespace and stripe-layout operations)
pub mod metadata {
    tonic::include_proto!("stripefs.metadata");
}

/// Storage service (OST block operations)
pub mod storage {
    tonic::include_proto!("stripefs.storage");
}

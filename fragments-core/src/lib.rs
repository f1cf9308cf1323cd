/*!
# Fragments Core

Owner-scoped fragment storage with on-demand format conversion.

A fragment is an opaque payload tagged with a media type. Its metadata and
its payload live in two independent stores, each with an in-memory adapter
and a durable AWS adapter (DynamoDB and S3, behind the `aws` feature). A
closed conversion table decides which alternative representations a
fragment can be served as.

## Architecture

- [`storage`]: the `MetadataStore` and `BlobStore` ports and their adapters
- [`fragment`]: the entity, its validation and write ordering
- [`convert`]: the conversion table and converters
- [`factory`]: backend selection from an explicit [`StoreConfig`]
- [`service`]: the caller-facing operations

## Usage

```rust
use bytes::Bytes;
use fragments_core::{create_stores, FragmentService, StoreConfig};

# async fn run() -> fragments_core::Result<()> {
let stores = create_stores(&StoreConfig::memory()).await?;
let service = FragmentService::new(stores);

let fragment = service
    .create("owner-1", "text/csv", Bytes::from_static(b"name,age\nJohn,30"))
    .await?;
let json = service
    .get_representation("owner-1", fragment.id(), "application/json")
    .await?;
# Ok(())
# }
```
*/

pub mod config;
pub mod convert;
pub mod error;
pub mod factory;
pub mod fragment;
pub mod media;
pub mod metadata;
pub mod observability;
pub mod service;
pub mod storage;


pub use config::{RetryConfig, StoreBackend, StoreConfig};
pub use error::{FragmentError, Result};
pub use factory::create_stores;
pub use fragment::{Fragment, FragmentInit, Listing};
pub use media::MediaKind;
pub use metadata::FragmentMetadata;
pub use service::{FragmentList, FragmentService, Representation};
pub use storage::{BlobStore, MetadataStore, Stores};

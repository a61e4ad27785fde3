//! AWS collaborators: SigV4 signing, S3 object store, SQS queue.

pub mod s3;
pub mod sigv4;
pub mod sqs;

pub use s3::{LocalBlob, ObjectStore, ObjectStoreError, S3Client};
pub use sigv4::AwsCredentials;
pub use sqs::{QueueError, QueueMessage, QueueTransport, SqsClient};

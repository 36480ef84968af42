mod buckets;
mod objects;
mod post_policy;
mod stream_upload;
mod uploads;

pub use buckets::{
    BucketExistsRequest, BucketsService, CreateBucketRequest, ListBucketsRequest,
    RemoveBucketRequest,
};
pub use objects::{
    CopyConditions, CopyObjectRequest, DownloadToFileRequest, GetObjectRequest,
    ListObjectsV2Pager, ListObjectsV2Request, ObjectsService, PresignObjectRequest,
    PutObjectRequest, RemoveObjectRequest, StatObjectRequest,
};
pub use post_policy::PostPolicy;
pub use stream_upload::UploadStreamRequest;
pub use uploads::{
    AbortUploadRequest, BytesSource, CompleteUploadRequest, FileSource, IncompleteUploadsPager,
    InitiateUploadRequest, ListIncompleteUploadsRequest, UploadPartRequest, UploadRequest,
    UploadSource, UploadsService,
};

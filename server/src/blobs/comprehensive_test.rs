//! Exercises every blob backend through the BlobStorage trait

#[cfg(test)]
mod integration_tests {
    use crate::blobs::config::{BlobBackend, BlobConfig};
    use crate::blobs::{BlobStorage, PublicAccess};
    use bytes::Bytes;
    use std::sync::Arc;

    fn stores(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn BlobStorage>)> {
        let local = BlobConfig {
            backend: BlobBackend::Local,
            base_path: dir.path().to_string_lossy().into_owned(),
            ..BlobConfig::default()
        };
        let mock = BlobConfig {
            backend: BlobBackend::Mock,
            ..BlobConfig::default()
        };
        vec![
            ("local", local.create_store().unwrap()),
            ("mock", mock.create_store().unwrap()),
        ]
    }

    #[tokio::test]
    async fn test_blob_storage_contract() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            assert!(store.create_container_if_not_exists("payment-proofs", PublicAccess::Private).await.unwrap());
            assert!(!store.create_container_if_not_exists("payment-proofs", PublicAccess::Blob).await.unwrap());
            assert_eq!(
                store.container_access("payment-proofs").await.unwrap(),
                PublicAccess::Private,
                "{}: access of an existing container is kept",
                name
            );
            assert!(store.container_exists("payment-proofs").await.unwrap());
            assert!(!store.container_exists("product-images").await.unwrap());

            let props = store
                .put_blob("payment-proofs", "20240101_120000_proof.pdf", Bytes::from_static(b"%PDF"))
                .await
                .unwrap();
            assert_eq!(props.size, 4, "{}", name);
            assert_eq!(
                store.get_blob("payment-proofs", "20240101_120000_proof.pdf").await.unwrap(),
                Bytes::from_static(b"%PDF")
            );

            assert!(store.delete_blob_if_exists("payment-proofs", "20240101_120000_proof.pdf").await.unwrap());
            assert!(!store.delete_blob_if_exists("payment-proofs", "20240101_120000_proof.pdf").await.unwrap());
            assert_eq!(store.list_containers().await.unwrap(), vec!["payment-proofs"], "{}", name);
        }
    }

    #[tokio::test]
    async fn test_missing_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in stores(&dir) {
            let err = store.get_blob("product-images", "x.png").await.unwrap_err();
            assert!(err.is_not_found(), "{}", name);
        }
    }
}

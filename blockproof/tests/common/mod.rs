use blockproof::{AuditRequest, Auditor, Commitment, MemoryBlockStore, Options, Sha3Hasher};
use std::sync::Arc;

/// Block contents shaped like the CSV chunks datasets are usually split into.
pub fn dataset(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| format!("id,value\n{},{}\n", i, i * 7).into_bytes())
        .collect()
}

#[allow(dead_code)]
pub fn commit(blocks: &[Vec<u8>]) -> Commitment {
    Commitment::from_contents::<Sha3Hasher, _, _>(blocks).unwrap()
}

#[allow(dead_code)]
pub fn request(total_blocks: u64) -> AuditRequest<'static> {
    AuditRequest {
        total_blocks,
        user_id: "alice",
        upload_id: "upload-1",
        timestamp: Some("2024-01-01T00:00:00Z"),
    }
}

#[allow(dead_code)]
pub fn options(workers: usize) -> Options {
    let mut o = Options::new();
    o.workers(workers);
    o
}

/// An auditor over an in-memory copy of `n` dataset blocks, plus their commitment.
#[allow(dead_code)]
pub fn memory_auditor(
    n: usize,
    options: Options,
) -> (Auditor<Sha3Hasher, MemoryBlockStore>, Arc<Commitment>) {
    let blocks = dataset(n);
    let commitment = commit(&blocks);
    let store = MemoryBlockStore::from_contents(blocks);
    (Auditor::new(options, store).unwrap(), Arc::new(commitment))
}

//! Bounded-concurrency fan-out across `Partition` shards with an order-preserving merge
//! and a compound continuation token (§4.G).
//!
//! Generic over the listing function a caller supplies, so this crate carries no
//! knowledge of schemas, access control, or the upstream client shape — only the
//! fan-out/merge mechanics, mirroring how `kube-runtime`'s stream combinators (`buffer_
//! unordered`, `select_all`) stay generic over the item type.
use std::future::Future;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::stream::{self, StreamExt};
use steve_core::client::ListPage;
use steve_core::dynamic::DynamicObject;
use steve_core::error::ErrorKind;
use steve_core::partition::Partition;

/// The merged result of fanning a list request out across partitions.
#[derive(Debug, Default, Clone)]
pub struct MergedList {
    /// Field: `pub items`.
    pub items: Vec<DynamicObject>,
    /// Field: `pub revision`.
    pub revision: Option<String>,
    /// Field: `pub continue_token`.
    pub continue_token: Option<String>,
}

/// Encodes "resume at partition `index`, re-issuing its upstream cursor `inner`, then drop
/// the first `skip` items of whatever comes back" as an opaque string. `skip` is only
/// nonzero when a prior call truncated mid-page to honour the caller's `limit`: the
/// partition's own page has no finer-grained cursor than "the whole page", so resuming
/// means re-fetching the identical page and discarding what was already returned from it.
fn encode_continue(index: usize, inner: &str, skip: usize) -> String {
    format!("{index}:{skip}:{}", URL_SAFE_NO_PAD.encode(inner))
}

/// The inverse of [`encode_continue`]. An absent or malformed token resumes at partition 0
/// with no inner token and nothing to skip, matching the spec's "revision -1/0 forwarded as
/// empty" leniency.
fn decode_continue(token: Option<&str>) -> (usize, usize, String) {
    let Some(token) = token else {
        return (0, 0, String::new());
    };
    let mut parts = token.splitn(3, ':');
    let (Some(index), Some(skip), Some(encoded)) = (parts.next(), parts.next(), parts.next()) else {
        return (0, 0, String::new());
    };
    let index: usize = index.parse().unwrap_or(0);
    let skip: usize = skip.parse().unwrap_or(0);
    let inner = URL_SAFE_NO_PAD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default();
    (index, skip, inner)
}

fn max_revision(current: &Option<String>, candidate: &Option<String>) -> Option<String> {
    match (current.as_deref(), candidate.as_deref()) {
        (None, c) => c.map(str::to_owned),
        (cur, None) => cur.map(str::to_owned),
        (Some(cur), Some(cand)) => {
            let cur_n: Option<u64> = cur.parse().ok();
            let cand_n: Option<u64> = cand.parse().ok();
            match (cur_n, cand_n) {
                (Some(a), Some(b)) => Some(a.max(b).to_string()),
                _ => Some(cur.max(cand).to_owned()),
            }
        }
    }
}

/// Fans a `List` out across `partitions`, issuing up to `concurrency` upstream calls at a
/// time, and merges the results in partition order.
pub struct PartitionLister<L> {
    partitions: Vec<Partition>,
    concurrency: usize,
    lister: L,
}

impl<L, Fut> PartitionLister<L>
where
    L: Fn(Partition, Option<String>, Option<String>, Option<u32>) -> Fut,
    Fut: Future<Output = Result<ListPage, ErrorKind>>,
{
    /// Function: `pub fn new`.
    pub fn new(partitions: Vec<Partition>, concurrency: usize, lister: L) -> Self {
        PartitionLister {
            partitions,
            concurrency: concurrency.max(1),
            lister,
        }
    }

    /// Run the fan-out. `revision` and `limit` are forwarded to every partition's upstream
    /// call; `continue_token`, if present, resumes at the partition and inner cursor it
    /// encodes rather than restarting the whole fan-out.
    pub async fn list(
        &self,
        revision: Option<String>,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> Result<MergedList, ErrorKind> {
        let (start_index, start_skip, inner_continue) = decode_continue(continue_token);
        if start_index >= self.partitions.len() {
            return Ok(MergedList::default());
        }

        let pending: Vec<(usize, Partition)> = self.partitions[start_index..]
            .iter()
            .cloned()
            .enumerate()
            .map(|(offset, partition)| (start_index + offset, partition))
            .collect();

        let mut fetched: Vec<Option<(usize, Option<String>, ListPage)>> = vec![None; pending.len()];
        let revision = &revision;
        let limit = &limit;
        let inner_continue = &inner_continue;

        let mut results = stream::iter(pending.into_iter().enumerate().map(|(slot, (index, partition))| {
            let cont = if index == start_index {
                Some(inner_continue.clone()).filter(|s| !s.is_empty())
            } else {
                None
            };
            let cont_used = cont.clone();
            async move {
                let page = (self.lister)(partition, cont, revision.clone(), *limit).await;
                (slot, index, cont_used, page)
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((slot, index, cont_used, page)) = results.next().await {
            fetched[slot] = Some((index, cont_used, page?));
        }

        let total_partitions = self.partitions.len();
        let mut merged = MergedList::default();
        for entry in fetched.into_iter().flatten() {
            let (index, cont_used, page) = entry;
            merged.revision = max_revision(&merged.revision, &page.resource_version);

            let skip = if index == start_index { start_skip } else { 0 };
            let items: Vec<_> = page.items.into_iter().skip(skip).collect();

            if let Some(limit) = *limit {
                let remaining = (limit as usize).saturating_sub(merged.items.len());
                if items.len() > remaining {
                    merged.items.extend(items.into_iter().take(remaining));
                    let consumed = skip + remaining;
                    merged.continue_token = Some(encode_continue(index, cont_used.as_deref().unwrap_or(""), consumed));
                    return Ok(merged);
                }
                merged.items.extend(items);
                if merged.items.len() >= limit as usize {
                    merged.continue_token = match page.continue_token {
                        Some(inner) => Some(encode_continue(index, &inner, 0)),
                        None if index + 1 < total_partitions => Some(encode_continue(index + 1, "", 0)),
                        None => None,
                    };
                    return Ok(merged);
                }
            } else {
                merged.items.extend(items);
            }

            if let Some(inner) = page.continue_token {
                merged.continue_token = Some(encode_continue(index, &inner, 0));
                break;
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn object(name: &str) -> DynamicObject {
        DynamicObject::new(name, "v1", "ConfigMap")
    }

    #[tokio::test]
    async fn merges_partitions_in_order_and_tracks_highest_revision() {
        let partitions = vec![
            Partition::namespace_all("ns-a"),
            Partition::namespace_all("ns-b"),
        ];
        let lister = PartitionLister::new(partitions, 2, |partition, _cont, _rev, _limit| async move {
            let (name, revision) = match partition.namespace() {
                "ns-a" => ("a1", "5"),
                _ => ("b1", "9"),
            };
            Ok(ListPage {
                items: vec![object(name)],
                resource_version: Some(revision.to_owned()),
                continue_token: None,
            })
        });

        let merged = lister.list(None, None, None).await.unwrap();
        assert_eq!(merged.items.len(), 2);
        assert_eq!(merged.items[0].name(), Some("a1"));
        assert_eq!(merged.items[1].name(), Some("b1"));
        assert_eq!(merged.revision, Some("9".to_owned()));
        assert!(merged.continue_token.is_none());
    }

    #[tokio::test]
    async fn a_partial_partition_page_produces_a_resumable_continue_token() {
        let partitions = vec![Partition::namespace_all("ns-a"), Partition::namespace_all("ns-b")];
        let lister = PartitionLister::new(partitions, 2, |partition, _cont, _rev, _limit| async move {
            if partition.namespace() == "ns-a" {
                Ok(ListPage {
                    items: vec![object("a1")],
                    resource_version: Some("1".to_owned()),
                    continue_token: Some("a-cursor".to_owned()),
                })
            } else {
                Ok(ListPage {
                    items: vec![object("b1")],
                    resource_version: Some("2".to_owned()),
                    continue_token: None,
                })
            }
        });

        let merged = lister.list(None, None, None).await.unwrap();
        let token = merged.continue_token.expect("partial page should resume");
        let (index, skip, inner) = decode_continue(Some(&token));
        assert_eq!(index, 0);
        assert_eq!(skip, 0);
        assert_eq!(inner, "a-cursor");
    }

    #[tokio::test]
    async fn resuming_from_a_continue_token_skips_earlier_partitions() {
        let partitions = vec![Partition::namespace_all("ns-a"), Partition::namespace_all("ns-b")];
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_closure = Arc::clone(&calls);
        let lister = PartitionLister::new(partitions, 2, move |partition, cont, _rev, _limit| {
            calls_in_closure.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(partition.namespace(), "ns-b");
                assert_eq!(cont.as_deref(), Some("resume-here"));
                Ok(ListPage {
                    items: vec![object("b1")],
                    resource_version: Some("3".to_owned()),
                    continue_token: None,
                })
            }
        });

        let token = encode_continue(1, "resume-here", 0);
        let merged = lister.list(None, None, Some(&token)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(merged.items.len(), 1);
    }

    #[tokio::test]
    async fn a_limit_smaller_than_the_total_truncates_and_points_at_the_next_partition() {
        // 5 namespaces of 100 objects each, limit=100: exactly one partition's worth.
        let partitions: Vec<Partition> = (0..5).map(|i| Partition::namespace_all(format!("ns-{i}"))).collect();
        let lister = PartitionLister::new(partitions, 3, |_partition, _cont, _rev, _limit| async move {
            Ok(ListPage {
                items: (0..100).map(|i| object(&format!("item-{i}"))).collect(),
                resource_version: Some("1".to_owned()),
                continue_token: None,
            })
        });

        let merged = lister.list(None, Some(100), None).await.unwrap();
        assert_eq!(merged.items.len(), 100);
        let (index, skip, inner) = decode_continue(merged.continue_token.as_deref());
        assert_eq!(index, 1);
        assert_eq!(skip, 0);
        assert!(inner.is_empty());
    }

    #[tokio::test]
    async fn a_limit_that_splits_a_single_partitions_page_resumes_mid_page() {
        let partitions = vec![Partition::namespace_all("ns-a"), Partition::namespace_all("ns-b")];
        let lister = PartitionLister::new(partitions, 2, |partition, _cont, _rev, _limit| async move {
            let items = if partition.namespace() == "ns-a" {
                (0..150).map(|i| object(&format!("a-{i}"))).collect()
            } else {
                (0..150).map(|i| object(&format!("b-{i}"))).collect()
            };
            Ok(ListPage { items, resource_version: Some("1".to_owned()), continue_token: None })
        });

        let first = lister.list(None, Some(100), None).await.unwrap();
        assert_eq!(first.items.len(), 100);
        assert_eq!(first.items[0].name(), Some("a-0"));
        assert_eq!(first.items[99].name(), Some("a-99"));

        let (index, skip, _inner) = decode_continue(first.continue_token.as_deref());
        assert_eq!(index, 0);
        assert_eq!(skip, 100);

        // Resuming drops the already-returned 100 items from ns-a's page (50 left), then
        // keeps filling from ns-b until the limit is met again.
        let second = lister.list(None, Some(100), first.continue_token.as_deref()).await.unwrap();
        assert_eq!(second.items.len(), 100);
        assert_eq!(second.items[0].name(), Some("a-100"));
        assert_eq!(second.items[49].name(), Some("a-149"));
        assert_eq!(second.items[50].name(), Some("b-0"));
        assert_eq!(second.items[99].name(), Some("b-49"));
    }
}

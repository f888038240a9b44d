//! User actions: a clicked link, a text selection, an inline match, or a
//! connection check. Each one classifies its input, talks to the daemon at
//! most once, and reports the outcome through the host ports.

use log::debug;

use crate::{
    config::ServerCredentials,
    model::{AddKind, AddResult, ConnectionReport},
    ports::{Launcher, Notice, Notifier},
    reference::{parse_one, scan, ReferenceKind, ScanMatch, TorrentReference},
    rpc::TransmissionClient,
};

const NOT_A_TORRENT_LINK: &str = "link is not a magnet link or .torrent file";
const NOT_A_SELECTION_REFERENCE: &str = "selection is not a magnet link or info-hash";

pub struct Actions<'a, N, L> {
    client: &'a TransmissionClient,
    server: &'a ServerCredentials,
    notifier: &'a N,
    launcher: &'a L,
}

impl<'a, N, L> Actions<'a, N, L>
where
    N: Notifier,
    L: Launcher,
{
    pub fn new(
        client: &'a TransmissionClient,
        server: &'a ServerCredentials,
        notifier: &'a N,
        launcher: &'a L,
    ) -> Self {
        Self {
            client,
            server,
            notifier,
            launcher,
        }
    }

    /// A link the user picked. Magnet links and anything ending in
    /// `.torrent` are accepted; a bare info-hash is not a link.
    pub fn submit_link(&self, link: &str) -> AddResult {
        let magnet = parse_one(link).filter(|reference| reference.kind() == ReferenceKind::Magnet);
        let reference = magnet.or_else(|| {
            let trimmed = link.trim();
            trimmed
                .to_ascii_lowercase()
                .ends_with(".torrent")
                .then(|| TorrentReference::TorrentFile {
                    url: trimmed.to_string(),
                })
        });
        match reference {
            Some(reference) => self.submit(&reference),
            None => self.reject(NOT_A_TORRENT_LINK),
        }
    }

    pub fn submit_selection(&self, text: &str) -> AddResult {
        match parse_one(text) {
            Some(reference) if reference.kind() != ReferenceKind::TorrentFile => {
                self.submit(&reference)
            }
            _ => self.reject(NOT_A_SELECTION_REFERENCE),
        }
    }

    /// Adds every reference found in `text`, in document order. Magnet
    /// matches without a usable hash are skipped.
    pub fn submit_scanned<'t>(&self, text: &'t str) -> Vec<(ScanMatch<'t>, AddResult)> {
        scan(text)
            .filter_map(|m| {
                let reference = m.reference();
                if reference.is_none() {
                    debug!("skipping unparsable match {:?}", m.text);
                }
                reference.map(|reference| (m, self.submit(&reference)))
            })
            .collect()
    }

    pub fn check_connection(&self) -> ConnectionReport {
        let report = self.client.test_connection(self.server);
        let notice = match (&report.version, &report.error) {
            (_, Some(error)) => Notice::error(format!("Connection failed: {error}")),
            (Some(version), None) => Notice::success(format!("Connected (v{version})")),
            (None, None) => Notice::success("Connected"),
        };
        self.notifier.notify(&notice);
        report
    }

    fn submit(&self, reference: &TorrentReference) -> AddResult {
        debug!("submitting {} {reference}", reference.kind().label());
        let result = self.client.add_torrent(self.server, reference);
        self.report(&result);
        result
    }

    fn reject(&self, reason: &str) -> AddResult {
        let result = AddResult::failed(reason);
        self.report(&result);
        result
    }

    fn report(&self, result: &AddResult) {
        if let Some(url) = result.upload_url.as_deref().filter(|_| result.redirect) {
            match self.launcher.open(url) {
                Ok(()) => self.notifier.notify(&Notice::info(result.summary())),
                Err(err) => self
                    .notifier
                    .notify(&Notice::error(format!("Could not open {url}: {err:#}"))),
            }
            return;
        }
        let notice = match (result.success, result.kind) {
            (false, _) => Notice::error(result.summary()),
            (true, Some(AddKind::Duplicate)) => Notice::warning(result.summary()),
            (true, _) => Notice::success(result.summary()),
        };
        self.notifier.notify(&notice);
    }
}

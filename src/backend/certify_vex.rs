//! VEX statements about a package version or artifact and a vulnerability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{LinkKind, LinkTarget, Linkable};
use super::matching::no_match;
use super::query::Listable;
use super::store::StoredNode;
use super::subject::subject_fields;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{
    CertifyVexStatement, CertifyVexStatementSpec, Connection, IdOrVulnerabilityInput,
    PackageOrArtifactInput, PackageOrArtifactInputs, VexJustification, VexStatementInputSpec,
    VexStatus,
};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CertifyVexNode {
    pub(crate) id: String,
    pub(crate) pkg: String,
    pub(crate) artifact: String,
    pub(crate) vulnerability: String,
    pub(crate) status: VexStatus,
    pub(crate) vex_justification: VexJustification,
    pub(crate) statement: String,
    pub(crate) status_notes: String,
    pub(crate) known_since: DateTime<Utc>,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for CertifyVexNode {
    const COLLECTION: &'static str = "certify_vexes";
    const KIND: &'static str = "certifyVEXStatement";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Free-text statement and notes are refreshable and stay out of the key.
    fn key(&self) -> String {
        KeyHasher::new("certify_vex")
            .field("pkg", &self.pkg)
            .field("artifact", &self.artifact)
            .field("vulnerability", &self.vulnerability)
            .field("status", &self.status.to_string())
            .field("vex_justification", &self.vex_justification.to_string())
            .time("known_since", &self.known_since)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .field("document_ref", &self.document_ref)
            .finish()
    }
}

impl LinkRecord for CertifyVexNode {
    const LINK_KIND: LinkKind = LinkKind::CertifyVex;
}

impl Listable for CertifyVexNode {
    type Spec = CertifyVexStatementSpec;
    type Output = CertifyVexStatement;

    fn spec_id(spec: &CertifyVexStatementSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(
        backend: &KvBackend,
        ctx: &Context,
        spec: &CertifyVexStatementSpec,
    ) -> GuacResult<Option<Vec<String>>> {
        if let Some(ids) = backend.package_or_artifact_candidates(ctx, spec.subject.as_ref(), LinkKind::CertifyVex)? {
            return Ok(Some(ids));
        }
        if let Some(vuln) = &spec.vulnerability {
            if let Some(node) = backend.exact_vulnerability(ctx, vuln)? {
                return Ok(Some(node.backrefs().get(LinkKind::CertifyVex).to_vec()));
            }
        }
        Ok(None)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &CertifyVexStatementSpec) -> GuacResult<bool> {
        if no_match(spec.status.as_ref(), &self.status)
            || no_match(spec.vex_justification.as_ref(), &self.vex_justification)
            || no_match(spec.statement.as_deref(), self.statement.as_str())
            || no_match(spec.status_notes.as_deref(), self.status_notes.as_str())
            || no_match(spec.known_since.as_ref(), &self.known_since)
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
        {
            return Ok(false);
        }
        if let Some(vuln) = &spec.vulnerability {
            if backend.build_vuln_response(ctx, &self.vulnerability, Some(vuln))?.is_none() {
                return Ok(false);
            }
        }
        match &spec.subject {
            Some(subject) => Ok(backend
                .package_or_artifact_response(ctx, &self.pkg, &self.artifact, Some(subject))?
                .is_some()),
            None => Ok(true),
        }
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<CertifyVexStatement> {
        let subject = backend
            .package_or_artifact_response(ctx, &self.pkg, &self.artifact, None)?
            .ok_or_else(|| GuacError::internal(format!("VEX statement {} lost its subject", self.id)))?;
        let vulnerability = backend
            .build_vuln_response(ctx, &self.vulnerability, None)?
            .ok_or_else(|| GuacError::internal(format!("VEX statement {} lost its vulnerability", self.id)))?;
        Ok(CertifyVexStatement {
            id: self.id.clone(),
            subject,
            vulnerability,
            status: self.status,
            vex_justification: self.vex_justification,
            statement: self.statement.clone(),
            status_notes: self.status_notes.clone(),
            known_since: self.known_since,
            origin: self.origin.clone(),
            collector: self.collector.clone(),
            document_ref: self.document_ref.clone(),
        })
    }
}

struct VexIngest<'a> {
    subject: PackageOrArtifactInput,
    vulnerability: &'a IdOrVulnerabilityInput,
    statement: &'a VexStatementInputSpec,
}

impl KvBackend {
    /// Records a VEX statement about a package version or artifact.
    ///
    /// # Errors
    /// Validation failures, unresolvable references and store failures, wrapped
    /// with the operation name.
    pub fn ingest_vex_statement(
        &self,
        ctx: &Context,
        subject: &PackageOrArtifactInput,
        vulnerability: &IdOrVulnerabilityInput,
        statement: &VexStatementInputSpec,
    ) -> GuacResult<String> {
        const OP: &str = "IngestVEXStatement";
        validation::package_or_artifact_input(subject).in_operation(OP)?;
        let input = VexIngest {
            subject: subject.clone(),
            vulnerability,
            statement,
        };
        self.ingest_vexes(ctx, OP, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_vex_statement`].
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_vex_statements(
        &self,
        ctx: &Context,
        subjects: &PackageOrArtifactInputs,
        vulnerabilities: &[IdOrVulnerabilityInput],
        statements: &[VexStatementInputSpec],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestVEXStatements";
        let len = validation::batch(
            "packages or artifacts",
            &[("packages", subjects.packages.len()), ("artifacts", subjects.artifacts.len())],
            &[("vulnerabilities", vulnerabilities.len()), ("vexStatements", statements.len())],
        )
        .in_operation(OP)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<VexIngest<'_>> = subjects
            .split()
            .into_iter()
            .zip(vulnerabilities)
            .zip(statements)
            .map(|((subject, vulnerability), statement)| VexIngest {
                subject,
                vulnerability,
                statement,
            })
            .collect();
        self.ingest_vexes(ctx, OP, &inputs)
    }

    fn ingest_vexes(&self, ctx: &Context, op: &'static str, inputs: &[VexIngest<'_>]) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let vulnerability = backend.resolve_vulnerability(ctx, input.vulnerability)?.id;
            let subject = backend.resolve_package_or_artifact(ctx, &input.subject)?;
            let (pkg, _, artifact) = subject_fields(&subject);
            let st = input.statement;
            let record = CertifyVexNode {
                id: String::new(),
                pkg,
                artifact,
                vulnerability: vulnerability.clone(),
                status: st.status,
                vex_justification: st.vex_justification,
                statement: st.statement.clone(),
                status_notes: st.status_notes.clone(),
                known_since: st.known_since,
                origin: st.origin.clone(),
                collector: st.collector.clone(),
                document_ref: st.document_ref.clone(),
            };
            Ok(Prepared {
                record,
                targets: vec![subject, LinkTarget::Vulnerability(vulnerability)],
            })
        })
    }

    /// VEX statements matching `spec`.
    ///
    /// # Errors
    /// A filter naming both subject kinds; store failures.
    pub fn certify_vex_statement(
        &self,
        ctx: &Context,
        spec: &CertifyVexStatementSpec,
    ) -> GuacResult<Vec<CertifyVexStatement>> {
        const OP: &str = "CertifyVEXStatement";
        validation::package_or_artifact_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.query_nodes::<CertifyVexNode>(ctx, OP, spec)
    }

    /// One page of VEX statements matching `spec`.
    ///
    /// # Errors
    /// A filter naming both subject kinds; store failures.
    pub fn certify_vex_statement_list(
        &self,
        ctx: &Context,
        spec: &CertifyVexStatementSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<CertifyVexStatement>> {
        const OP: &str = "CertifyVEXStatementList";
        validation::package_or_artifact_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.list_nodes::<CertifyVexNode>(ctx, OP, spec, after, first)
    }
}

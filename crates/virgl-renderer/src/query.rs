//! Guest queries and conditional rendering.
//!
//! Results land in the query's backing resource as a small host-state
//! record the guest polls: `{ state: u32, result_size: u32, result: u64 }`.

use std::cell::Cell;
use std::rc::Rc;

use gl::types::GLenum;
use tracing::{trace, warn};
use virgl_core::error::RendererResult;
use virgl_core::pipe::{QueryType, RenderCondMode};
use virgl_core::{ContextErrorKind, Handle, RendererError};
use virgl_gl::Feature;

use crate::gl_objects::GlQuery;
use crate::host::Host;
use crate::resource::{Resource, Storage};

const QUERY_WAIT_INVERTED: GLenum = 0x8e17;
const QUERY_NO_WAIT_INVERTED: GLenum = 0x8e18;
const QUERY_BY_REGION_WAIT_INVERTED: GLenum = 0x8e19;
const QUERY_BY_REGION_NO_WAIT_INVERTED: GLenum = 0x8e1a;
const TRANSFORM_FEEDBACK_OVERFLOW: GLenum = 0x82ec;
const TRANSFORM_FEEDBACK_STREAM_OVERFLOW: GLenum = 0x82ed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryCreateArgs {
    pub handle: Handle,
    pub query_type: u32,
    /// Vertex stream for stream-output queries.
    pub index: u32,
    pub res_handle: Handle,
    pub offset: u32,
}

/// Progress recorded in the result resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum QueryState {
    New = 0,
    WaitHost = 1,
    Done = 2,
}

#[derive(Debug)]
pub(crate) struct Query {
    pub handle: Handle,
    pub ty: QueryType,
    pub index: u32,
    /// GL query target; `None` for queries answered without GL.
    pub gl_target: Option<GLenum>,
    pub query: GlQuery,
    pub res: Rc<Resource>,
    pub offset: u32,
    pub state: Cell<QueryState>,
}

fn gl_query_target(host: &Host, ty: QueryType, index: u32) -> RendererResult<Option<GLenum>> {
    let target = match ty {
        QueryType::OcclusionCounter if host.is_gles() => {
            warn!("GLES host has no sample counter, reporting any-samples-passed");
            gl::ANY_SAMPLES_PASSED
        }
        QueryType::OcclusionCounter => gl::SAMPLES_PASSED,
        QueryType::OcclusionPredicate => gl::ANY_SAMPLES_PASSED,
        QueryType::OcclusionPredicateConservative => {
            if host.caps.gl_ver() >= 43 || host.is_gles() {
                gl::ANY_SAMPLES_PASSED_CONSERVATIVE
            } else {
                gl::ANY_SAMPLES_PASSED
            }
        }
        QueryType::Timestamp => gl::TIMESTAMP,
        QueryType::TimeElapsed => gl::TIME_ELAPSED,
        QueryType::PrimitivesGenerated => gl::PRIMITIVES_GENERATED,
        QueryType::PrimitivesEmitted => gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN,
        QueryType::SoOverflowPredicate if host.has(Feature::TransformFeedbackOverflowQuery) => {
            TRANSFORM_FEEDBACK_STREAM_OVERFLOW
        }
        QueryType::SoOverflowAnyPredicate if host.has(Feature::TransformFeedbackOverflowQuery) => {
            TRANSFORM_FEEDBACK_OVERFLOW
        }
        QueryType::GpuFinished => return Ok(None),
        other => {
            warn!("unsupported query type {other:?}");
            return Err(RendererError::Inval);
        }
    };
    if index > 0 && !host.has(Feature::TransformFeedback3) {
        warn!("indexed query {index} needs ARB_transform_feedback3");
        return Err(RendererError::Inval);
    }
    Ok(Some(target))
}

impl Query {
    pub fn new(host: &Host, args: &QueryCreateArgs, res: Rc<Resource>) -> RendererResult<Self> {
        let ty = QueryType::from_raw(args.query_type).ok_or(RendererError::Inval)?;
        let gl_target = gl_query_target(host, ty, args.index)?;
        if res.is_buffer() && (args.offset as usize + 16) > res.width as usize {
            return Err(RendererError::context(
                ContextErrorKind::IllegalResource,
                args.res_handle,
                "create_query",
            ));
        }
        let query = Self {
            handle: args.handle,
            ty,
            index: args.index,
            gl_target,
            query: GlQuery::new(&host.gl),
            res,
            offset: args.offset,
            state: Cell::new(QueryState::New),
        };
        query.write_state(host, QueryState::New, 0);
        Ok(query)
    }

    pub fn begin(&self, host: &Host) -> RendererResult<()> {
        let Some(target) = self.gl_target else {
            return Ok(());
        };
        if self.ty == QueryType::Timestamp {
            return Err(RendererError::Inval);
        }
        if self.index > 0 {
            host.gl.begin_query_indexed(target, self.index, self.query.id());
        } else {
            host.gl.begin_query(target, self.query.id());
        }
        self.state.set(QueryState::New);
        Ok(())
    }

    pub fn end(&self, host: &Host) {
        let Some(target) = self.gl_target else {
            return;
        };
        if self.ty == QueryType::Timestamp {
            host.gl.query_counter(self.query.id(), gl::TIMESTAMP);
        } else if self.index > 0 {
            host.gl.end_query_indexed(target, self.index);
        } else {
            host.gl.end_query(target);
        }
    }

    /// Fetch the result if GL has it (always when `wait`), storing it in the
    /// resource. Returns whether the query is done.
    pub fn check(&self, host: &Host, wait: bool) -> bool {
        let result = match self.gl_target {
            None => 1,
            Some(_) => {
                let id = self.query.id();
                if !wait && host.gl.get_query_object_u64(id, gl::QUERY_RESULT_AVAILABLE) == 0 {
                    return false;
                }
                host.gl.get_query_object_u64(id, gl::QUERY_RESULT)
            }
        };
        let result = match self.ty {
            QueryType::OcclusionPredicate
            | QueryType::OcclusionPredicateConservative
            | QueryType::SoOverflowPredicate
            | QueryType::SoOverflowAnyPredicate => u64::from(result != 0),
            _ => result,
        };
        trace!("query {} result {result}", self.handle);
        self.write_state(host, QueryState::Done, result);
        true
    }

    pub fn mark_waiting(&self, host: &Host) {
        if self.state.get() != QueryState::WaitHost {
            self.write_state(host, QueryState::WaitHost, 0);
        }
    }

    fn write_state(&self, host: &Host, state: QueryState, result: u64) {
        self.state.set(state);
        let mut record = [0u8; 16];
        record[0..4].copy_from_slice(&(state as u32).to_le_bytes());
        record[4..8].copy_from_slice(&8u32.to_le_bytes());
        record[8..16].copy_from_slice(&result.to_le_bytes());
        let offset = self.offset as usize;
        match &self.res.storage {
            Storage::System(data) => {
                let mut data = data.borrow_mut();
                if let Some(dst) = data.get_mut(offset..offset + record.len()) {
                    dst.copy_from_slice(&record);
                }
            }
            Storage::Buffer { buffer, target, .. } => {
                host.gl.bind_buffer(*target, buffer.id());
                host.gl.buffer_sub_data(*target, offset, &record);
            }
            Storage::Texture(_) => warn!("query {} backed by a texture", self.handle),
        }
    }
}

/// GL mode for `glBeginConditionalRender`.
pub(crate) fn render_condition_mode(host: &Host, mode: RenderCondMode, inverted: bool) -> GLenum {
    if inverted && !host.has(Feature::ConditionalRenderInverted) {
        warn!("inverted render condition unsupported, ignoring inversion");
    }
    let inverted = inverted && host.has(Feature::ConditionalRenderInverted);
    match (mode, inverted) {
        (RenderCondMode::Wait, false) => gl::QUERY_WAIT,
        (RenderCondMode::NoWait, false) => gl::QUERY_NO_WAIT,
        (RenderCondMode::ByRegionWait, false) => gl::QUERY_BY_REGION_WAIT,
        (RenderCondMode::ByRegionNoWait, false) => gl::QUERY_BY_REGION_NO_WAIT,
        (RenderCondMode::Wait, true) => QUERY_WAIT_INVERTED,
        (RenderCondMode::NoWait, true) => QUERY_NO_WAIT_INVERTED,
        (RenderCondMode::ByRegionWait, true) => QUERY_BY_REGION_WAIT_INVERTED,
        (RenderCondMode::ByRegionNoWait, true) => QUERY_BY_REGION_NO_WAIT_INVERTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceCreateArgs;
    use crate::test_support::mock_host;
    use pretty_assertions::assert_eq;
    use virgl_core::pipe::{BindFlags, TextureTarget};

    fn query_buffer(host: &Rc<Host>) -> Rc<Resource> {
        let args = ResourceCreateArgs {
            handle: 1,
            target: TextureTarget::Buffer as u32,
            bind: BindFlags::CUSTOM.bits(),
            width: 64,
            height: 1,
            depth: 1,
            array_size: 1,
            ..Default::default()
        };
        Rc::new(Resource::create(host, &args, None).unwrap())
    }

    fn stored(res: &Resource) -> (u32, u64) {
        let Storage::System(data) = &res.storage else {
            panic!("not host memory");
        };
        let data = data.borrow();
        let state = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let result = u64::from_le_bytes(data[8..16].try_into().unwrap());
        (state, result)
    }

    #[test]
    fn predicate_result_is_boolean() {
        let (host, gl) = mock_host();
        let res = query_buffer(&host);
        let args = QueryCreateArgs {
            handle: 3,
            query_type: QueryType::OcclusionPredicate as u32,
            res_handle: 1,
            ..Default::default()
        };
        let q = Query::new(&host, &args, Rc::clone(&res)).unwrap();
        assert_eq!(stored(&res), (QueryState::New as u32, 0));

        q.begin(&host).unwrap();
        q.end(&host);
        gl.set_query_result(42, false);
        assert!(!q.check(&host, false));
        gl.set_query_result(42, true);
        assert!(q.check(&host, false));
        assert_eq!(stored(&res), (QueryState::Done as u32, 1));
    }

    #[test]
    fn timestamp_uses_counter() {
        let (host, gl) = mock_host();
        let res = query_buffer(&host);
        let args = QueryCreateArgs {
            handle: 4,
            query_type: QueryType::Timestamp as u32,
            res_handle: 1,
            ..Default::default()
        };
        let q = Query::new(&host, &args, res).unwrap();
        assert!(q.begin(&host).is_err());
        q.end(&host);
        assert_eq!(gl.count("QueryCounter"), 1);
    }

    #[test]
    fn indexed_queries_need_tfb3() {
        let (host, _gl) = mock_host();
        let res = query_buffer(&host);
        let args = QueryCreateArgs {
            handle: 5,
            query_type: QueryType::PrimitivesEmitted as u32,
            index: 1,
            res_handle: 1,
            ..Default::default()
        };
        // The mock reports GL 4.5, which includes transform_feedback3.
        assert!(Query::new(&host, &args, res).is_ok());
    }

    #[test]
    fn overflow_predicates_need_gl46() {
        let (host, _gl) = mock_host();
        assert_eq!(
            gl_query_target(&host, QueryType::SoOverflowPredicate, 0),
            Err(RendererError::Inval)
        );

        let gl = std::sync::Arc::new(virgl_gl::mock::MockGl::with_version("4.6.0 Mock"));
        let host = Host::new(
            gl,
            std::sync::Arc::new(crate::test_support::NullCallbacks),
            virgl_core::RendererConfig::default(),
        )
        .unwrap();
        assert_eq!(
            gl_query_target(&host, QueryType::SoOverflowPredicate, 0),
            Ok(Some(0x82ed))
        );
        assert_eq!(
            gl_query_target(&host, QueryType::SoOverflowAnyPredicate, 0),
            Ok(Some(0x82ec))
        );
    }
}

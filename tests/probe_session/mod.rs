mod probe_flow_test;
mod unresponsive_vp_test;
